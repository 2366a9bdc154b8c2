use crate::sql::now;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use linktrack_core::click::{classify_device, QR_SOURCE, TOP_LINKS_LIMIT, TOP_REFERRERS_LIMIT};
use linktrack_core::repository::Result;
use linktrack_core::{
    ClickEvent, ClickRepository, DeviceCount, LinkFilter, LinkStats, LinkSummary, LinkUpdate,
    NewClick, NewLink, Overview, ReadRepository, ReferrerCount, Repository, ShortCode, ShortLink,
    SourceCount, StorageError, TimeBucket, TimeseriesPoint,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

/// In-memory implementation of the link and click repositories using DashMap.
///
/// DashMap uses sharded locks, so concurrent redirects for different codes
/// do not block each other. Code uniqueness is enforced through the entry
/// API, which holds the shard lock between the check and the insert.
#[derive(Debug)]
pub struct InMemoryRepository {
    links: DashMap<String, ShortLink>,
    codes_by_id: DashMap<i64, String>,
    clicks: DashMap<i64, Vec<ClickEvent>>,
    next_link_id: AtomicI64,
    next_click_id: AtomicI64,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new in-memory repository sized for `capacity` links.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            links: DashMap::with_capacity(capacity),
            codes_by_id: DashMap::with_capacity(capacity),
            clicks: DashMap::with_capacity(capacity),
            next_link_id: AtomicI64::new(1),
            next_click_id: AtomicI64::new(1),
        }
    }

    fn summarize(&self, link: ShortLink) -> LinkSummary {
        let (total_clicks, unique_visitors) = match self.clicks.get(&link.id) {
            Some(events) => (events.len() as i64, count_unique_visitors(events.iter())),
            None => (0, 0),
        };

        LinkSummary {
            link,
            total_clicks,
            unique_visitors,
        }
    }

    fn all_links(&self) -> Vec<ShortLink> {
        self.links.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn count_unique_visitors<'a>(events: impl Iterator<Item = &'a ClickEvent>) -> i64 {
    events
        .filter_map(|event| event.ip_address.as_deref())
        .collect::<HashSet<_>>()
        .len() as i64
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn resolve(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        Ok(self.links.get(code.as_str()).map(|entry| entry.value().clone()))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.links.contains_key(code.as_str()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, link: NewLink) -> Result<ShortLink> {
        let created_at = now()?;

        match self.links.entry(link.code.as_str().to_owned()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(link.code.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_link_id.fetch_add(1, Ordering::Relaxed);
                let stored = ShortLink {
                    id,
                    code: link.code,
                    target_url: link.target_url,
                    label: link.label,
                    campaign: link.campaign,
                    created_at,
                    active: true,
                };
                self.codes_by_id.insert(id, stored.code.as_str().to_owned());
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn set_active(&self, code: &ShortCode, active: bool) -> Result<Option<ShortLink>> {
        Ok(self.links.get_mut(code.as_str()).map(|mut entry| {
            entry.active = active;
            entry.clone()
        }))
    }

    async fn update(&self, code: &ShortCode, update: LinkUpdate) -> Result<Option<ShortLink>> {
        Ok(self.links.get_mut(code.as_str()).map(|mut entry| {
            entry.label = update.label.apply(entry.label.take());
            entry.campaign = update.campaign.apply(entry.campaign.take());
            entry.clone()
        }))
    }

    async fn list(&self, filter: &LinkFilter) -> Result<Vec<LinkSummary>> {
        let mut links: Vec<ShortLink> = self
            .all_links()
            .into_iter()
            .filter(|link| {
                filter
                    .campaign
                    .as_ref()
                    .is_none_or(|campaign| link.campaign.as_ref() == Some(campaign))
            })
            .filter(|link| filter.active.is_none_or(|active| link.active == active))
            .collect();
        links.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(links
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .map(|link| self.summarize(link))
            .collect())
    }
}

#[async_trait]
impl ClickRepository for InMemoryRepository {
    async fn record_click(&self, click: NewClick) -> Result<ClickEvent> {
        if !self.codes_by_id.contains_key(&click.link_id) {
            return Err(StorageError::Query(format!(
                "click references unknown link id {}",
                click.link_id
            )));
        }

        let event = ClickEvent {
            id: self.next_click_id.fetch_add(1, Ordering::Relaxed),
            link_id: click.link_id,
            ip_address: click.ip_address,
            user_agent: click.user_agent,
            referrer: click.referrer,
            source: click.source,
            clicked_at: now()?,
        };

        self.clicks
            .entry(click.link_id)
            .or_default()
            .push(event.clone());

        Ok(event)
    }

    async fn link_stats(&self, link_id: i64) -> Result<LinkStats> {
        let events = match self.clicks.get(&link_id) {
            Some(events) => events.clone(),
            None => return Ok(LinkStats::default()),
        };

        let mut by_source: BTreeMap<&str, (i64, HashSet<&str>)> = BTreeMap::new();
        let mut by_referrer: BTreeMap<&str, i64> = BTreeMap::new();
        for event in &events {
            let (clicks, visitors) = by_source.entry(event.source.as_str()).or_default();
            *clicks += 1;
            if let Some(ip) = event.ip_address.as_deref() {
                visitors.insert(ip);
            }
            if let Some(referrer) = event.referrer.as_deref() {
                *by_referrer.entry(referrer).or_default() += 1;
            }
        }

        // BTreeMap iteration is ascending by key, and the stable sort keeps
        // that order among equal counts.
        let mut sources: Vec<SourceCount> = by_source
            .into_iter()
            .map(|(source, (clicks, visitors))| SourceCount {
                source: source.to_owned(),
                clicks,
                unique_visitors: visitors.len() as i64,
            })
            .collect();
        sources.sort_by(|a, b| b.clicks.cmp(&a.clicks));

        let mut top_referrers: Vec<ReferrerCount> = by_referrer
            .into_iter()
            .map(|(referrer, clicks)| ReferrerCount {
                referrer: referrer.to_owned(),
                clicks,
            })
            .collect();
        top_referrers.sort_by(|a, b| b.clicks.cmp(&a.clicks));
        top_referrers.truncate(TOP_REFERRERS_LIMIT as usize);

        Ok(LinkStats {
            total_clicks: events.len() as i64,
            unique_visitors: count_unique_visitors(events.iter()),
            qr_clicks: events.iter().filter(|e| e.source == QR_SOURCE).count() as i64,
            first_clicked_at: events.iter().map(|e| e.clicked_at).min(),
            last_clicked_at: events.iter().map(|e| e.clicked_at).max(),
            sources,
            top_referrers,
        })
    }

    async fn recent_clicks(&self, link_id: i64, limit: u32) -> Result<Vec<ClickEvent>> {
        let Some(events) = self.clicks.get(&link_id) else {
            return Ok(Vec::new());
        };

        Ok(events
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn timeseries(
        &self,
        link_id: i64,
        since: Timestamp,
        bucket: TimeBucket,
    ) -> Result<Vec<TimeseriesPoint>> {
        let Some(events) = self.clicks.get(&link_id) else {
            return Ok(Vec::new());
        };

        let mut buckets: BTreeMap<Timestamp, (i64, HashSet<&str>)> = BTreeMap::new();
        for event in events.iter().filter(|e| e.clicked_at >= since) {
            let (clicks, visitors) = buckets
                .entry(bucket.start_of(event.clicked_at))
                .or_default();
            *clicks += 1;
            if let Some(ip) = event.ip_address.as_deref() {
                visitors.insert(ip);
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(bucket_start, (clicks, visitors))| TimeseriesPoint {
                bucket_start,
                clicks,
                unique_visitors: visitors.len() as i64,
            })
            .collect())
    }

    async fn device_breakdown(&self, link_id: i64) -> Result<Vec<DeviceCount>> {
        let Some(events) = self.clicks.get(&link_id) else {
            return Ok(Vec::new());
        };

        let mut by_device: BTreeMap<&str, i64> = BTreeMap::new();
        for event in events.iter() {
            *by_device
                .entry(classify_device(event.user_agent.as_deref()))
                .or_default() += 1;
        }

        let mut devices: Vec<DeviceCount> = by_device
            .into_iter()
            .map(|(device, clicks)| DeviceCount {
                device: device.to_owned(),
                clicks,
            })
            .collect();
        devices.sort_by(|a, b| b.clicks.cmp(&a.clicks));
        Ok(devices)
    }

    async fn overview(&self, since: Timestamp) -> Result<Overview> {
        let links = self.all_links();
        let events: Vec<ClickEvent> = self
            .clicks
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();

        let mut top_links: Vec<LinkSummary> = links
            .iter()
            .filter(|link| link.active)
            .cloned()
            .map(|link| self.summarize(link))
            .collect();
        top_links.sort_by(|a, b| {
            b.total_clicks
                .cmp(&a.total_clicks)
                .then_with(|| b.link.id.cmp(&a.link.id))
        });
        top_links.truncate(TOP_LINKS_LIMIT as usize);

        Ok(Overview {
            total_links: links.len() as i64,
            active_links: links.iter().filter(|link| link.active).count() as i64,
            total_clicks: events.len() as i64,
            unique_visitors: count_unique_visitors(events.iter()),
            clicks_since: events.iter().filter(|e| e.clicked_at >= since).count() as i64,
            links_created_since: links.iter().filter(|l| l.created_at >= since).count() as i64,
            top_links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;
    use linktrack_core::FieldUpdate;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn new_link(c: &str, url: &str) -> NewLink {
        NewLink {
            code: code(c),
            target_url: url.to_string(),
            label: None,
            campaign: None,
        }
    }

    fn click(link_id: i64, ip: &str, source: &str) -> NewClick {
        NewClick::new(link_id, Some(ip.to_string()), None, None, source)
    }

    #[tokio::test]
    async fn create_and_resolve() {
        let repo = InMemoryRepository::new();

        let created = repo
            .create(new_link("abc123", "https://example.com"))
            .await
            .unwrap();
        assert!(created.active);

        let resolved = repo.resolve(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(resolved, created);
    }

    #[tokio::test]
    async fn resolve_nonexistent() {
        let repo = InMemoryRepository::new();

        assert!(repo.resolve(&code("nope")).await.unwrap().is_none());
        assert!(!repo.exists(&code("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn create_conflict() {
        let repo = InMemoryRepository::new();

        repo.create(new_link("abc123", "https://example.com"))
            .await
            .unwrap();

        let err = repo
            .create(new_link("abc123", "https://other.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        let kept = repo.resolve(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(kept.target_url, "https://example.com");
    }

    #[tokio::test]
    async fn codes_are_case_sensitive() {
        let repo = InMemoryRepository::new();

        repo.create(new_link("AbC", "https://upper.com")).await.unwrap();
        repo.create(new_link("abc", "https://lower.com")).await.unwrap();

        let upper = repo.resolve(&code("AbC")).await.unwrap().unwrap();
        assert_eq!(upper.target_url, "https://upper.com");
    }

    #[tokio::test]
    async fn deactivated_link_still_exists() {
        let repo = InMemoryRepository::new();
        repo.create(new_link("abc123", "https://example.com"))
            .await
            .unwrap();

        let link = repo.set_active(&code("abc123"), false).await.unwrap().unwrap();
        assert!(!link.active);
        assert!(repo.exists(&code("abc123")).await.unwrap());

        assert!(repo.set_active(&code("missing"), false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_keeps_clears_and_sets() {
        let repo = InMemoryRepository::new();
        let mut link = new_link("abc123", "https://example.com");
        link.label = Some("old".to_string());
        link.campaign = Some("spring".to_string());
        repo.create(link).await.unwrap();

        let updated = repo
            .update(
                &code("abc123"),
                LinkUpdate {
                    label: FieldUpdate::Set("new".to_string()),
                    campaign: FieldUpdate::Keep,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.label.as_deref(), Some("new"));
        assert_eq!(updated.campaign.as_deref(), Some("spring"));

        let cleared = repo
            .update(
                &code("abc123"),
                LinkUpdate {
                    label: FieldUpdate::Keep,
                    campaign: FieldUpdate::Clear,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cleared.label.as_deref(), Some("new"));
        assert_eq!(cleared.campaign, None);
    }

    #[tokio::test]
    async fn list_filters_and_pages_newest_first() {
        let repo = InMemoryRepository::new();
        for i in 0..5 {
            let mut link = new_link(&format!("code{i}"), "https://example.com");
            link.campaign = (i % 2 == 0).then(|| "even".to_string());
            repo.create(link).await.unwrap();
        }
        repo.set_active(&code("code4"), false).await.unwrap();

        let all = repo.list(&LinkFilter::default()).await.unwrap();
        let codes: Vec<&str> = all.iter().map(|s| s.link.code.as_str()).collect();
        assert_eq!(codes, ["code4", "code3", "code2", "code1", "code0"]);

        let even_active = repo
            .list(&LinkFilter {
                campaign: Some("even".to_string()),
                active: Some(true),
                ..LinkFilter::default()
            })
            .await
            .unwrap();
        let codes: Vec<&str> = even_active.iter().map(|s| s.link.code.as_str()).collect();
        assert_eq!(codes, ["code2", "code0"]);

        let page = repo
            .list(&LinkFilter {
                limit: 2,
                offset: 1,
                ..LinkFilter::default()
            })
            .await
            .unwrap();
        let codes: Vec<&str> = page.iter().map(|s| s.link.code.as_str()).collect();
        assert_eq!(codes, ["code3", "code2"]);
    }

    #[tokio::test]
    async fn record_click_requires_known_link() {
        let repo = InMemoryRepository::new();

        let err = repo.record_click(click(42, "1.1.1.1", "direct")).await.unwrap_err();
        assert!(matches!(err, StorageError::Query(_)));
    }

    #[tokio::test]
    async fn link_stats_aggregate_clicks() {
        let repo = InMemoryRepository::new();
        let link = repo
            .create(new_link("abc123", "https://example.com"))
            .await
            .unwrap();

        repo.record_click(click(link.id, "1.1.1.1", "direct")).await.unwrap();
        repo.record_click(click(link.id, "1.1.1.1", "qr")).await.unwrap();
        repo.record_click(click(link.id, "2.2.2.2", "qr")).await.unwrap();
        repo.record_click(NewClick::new(
            link.id,
            None,
            None,
            Some("https://news.example.org/a".to_string()),
            "referral_news.example.org",
        ))
        .await
        .unwrap();

        let stats = repo.link_stats(link.id).await.unwrap();
        assert_eq!(stats.total_clicks, 4);
        assert_eq!(stats.unique_visitors, 2);
        assert_eq!(stats.qr_clicks, 2);
        assert!(stats.first_clicked_at <= stats.last_clicked_at);

        assert_eq!(stats.sources[0].source, "qr");
        assert_eq!(stats.sources[0].clicks, 2);
        assert_eq!(stats.sources[0].unique_visitors, 2);
        assert_eq!(stats.sources.len(), 3);
        assert_eq!(stats.sources[1].source, "direct");

        assert_eq!(stats.top_referrers.len(), 1);
        assert_eq!(stats.top_referrers[0].referrer, "https://news.example.org/a");
    }

    #[tokio::test]
    async fn link_stats_without_clicks_are_zero() {
        let repo = InMemoryRepository::new();
        let link = repo
            .create(new_link("abc123", "https://example.com"))
            .await
            .unwrap();

        let stats = repo.link_stats(link.id).await.unwrap();
        assert_eq!(stats, LinkStats::default());
    }

    #[tokio::test]
    async fn recent_clicks_newest_first() {
        let repo = InMemoryRepository::new();
        let link = repo
            .create(new_link("abc123", "https://example.com"))
            .await
            .unwrap();

        for i in 0..5 {
            repo.record_click(click(link.id, &format!("10.0.0.{i}"), "direct"))
                .await
                .unwrap();
        }

        let recent = repo.recent_clicks(link.id, 3).await.unwrap();
        let ips: Vec<&str> = recent
            .iter()
            .filter_map(|c| c.ip_address.as_deref())
            .collect();
        assert_eq!(ips, ["10.0.0.4", "10.0.0.3", "10.0.0.2"]);
    }

    #[tokio::test]
    async fn overview_counts_and_top_links() {
        let repo = InMemoryRepository::new();
        let busy = repo.create(new_link("busy", "https://a.com")).await.unwrap();
        let quiet = repo.create(new_link("quiet", "https://b.com")).await.unwrap();
        let off = repo.create(new_link("off", "https://c.com")).await.unwrap();
        repo.set_active(&off.code, false).await.unwrap();

        repo.record_click(click(busy.id, "1.1.1.1", "direct")).await.unwrap();
        repo.record_click(click(busy.id, "2.2.2.2", "direct")).await.unwrap();
        repo.record_click(click(off.id, "1.1.1.1", "direct")).await.unwrap();

        let overview = repo
            .overview(Timestamp::now() - SignedDuration::from_hours(24))
            .await
            .unwrap();
        assert_eq!(overview.total_links, 3);
        assert_eq!(overview.active_links, 2);
        assert_eq!(overview.total_clicks, 3);
        assert_eq!(overview.unique_visitors, 2);
        assert_eq!(overview.clicks_since, 3);
        assert_eq!(overview.links_created_since, 3);

        let top: Vec<i64> = overview.top_links.iter().map(|s| s.link.id).collect();
        assert_eq!(top, [busy.id, quiet.id]);

        let later = repo
            .overview(Timestamp::now() + SignedDuration::from_hours(1))
            .await
            .unwrap();
        assert_eq!(later.clicks_since, 0);
        assert_eq!(later.links_created_since, 0);
    }

    #[tokio::test]
    async fn timeseries_groups_by_bucket() {
        let repo = InMemoryRepository::new();
        let link = repo.create(new_link("series", "https://a.com")).await.unwrap();

        let day: Timestamp = "2024-03-10T00:00:00Z".parse().unwrap();
        let at = |hours: i64, ip: &str| ClickEvent {
            id: 0,
            link_id: link.id,
            ip_address: Some(ip.to_string()),
            user_agent: None,
            referrer: None,
            source: "direct".to_string(),
            clicked_at: day + SignedDuration::from_hours(hours),
        };
        repo.clicks.entry(link.id).or_default().extend([
            at(-30, "1.1.1.1"),
            at(2, "1.1.1.1"),
            at(2, "1.1.1.1"),
            at(5, "2.2.2.2"),
            at(26, "3.3.3.3"),
        ]);

        let daily = repo
            .timeseries(link.id, day, TimeBucket::Day)
            .await
            .unwrap();
        assert_eq!(
            daily,
            [
                TimeseriesPoint {
                    bucket_start: day,
                    clicks: 3,
                    unique_visitors: 2,
                },
                TimeseriesPoint {
                    bucket_start: day + SignedDuration::from_hours(24),
                    clicks: 1,
                    unique_visitors: 1,
                },
            ]
        );

        let hourly = repo
            .timeseries(link.id, day, TimeBucket::Hour)
            .await
            .unwrap();
        let starts: Vec<Timestamp> = hourly.iter().map(|p| p.bucket_start).collect();
        assert_eq!(
            starts,
            [2, 5, 26].map(|h| day + SignedDuration::from_hours(h))
        );
        assert_eq!(hourly[0].clicks, 2);

        assert!(repo
            .timeseries(999, day, TimeBucket::Day)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn device_breakdown_counts_by_class() {
        let repo = InMemoryRepository::new();
        let link = repo.create(new_link("devices", "https://a.com")).await.unwrap();

        let agents = [
            Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148"),
            Some("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
            Some("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)"),
            Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
            None,
            None,
        ];
        for agent in agents {
            let click = NewClick::new(link.id, None, agent.map(str::to_string), None, "direct");
            repo.record_click(click).await.unwrap();
        }

        let devices = repo.device_breakdown(link.id).await.unwrap();
        let counts: Vec<(&str, i64)> = devices
            .iter()
            .map(|d| (d.device.as_str(), d.clicks))
            .collect();
        assert_eq!(counts, [("desktop", 3), ("mobile", 2), ("tablet", 1)]);

        assert!(repo.device_breakdown(999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_creates_with_same_code() {
        use std::sync::Arc;

        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..16u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.create(new_link("shared", &format!("https://example{i}.com")))
                    .await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
    }
}
