//! Queries, row mappings and the repository implementation shared by the
//! SQL backends.
//!
//! SQLite and MySQL accept the same `?` placeholder syntax and the queries
//! below stick to the common subset of both dialects, so a single
//! implementation is stamped out per backend with [`impl_sql_repository`].

use jiff::Timestamp;
use linktrack_core::repository::Result;
use linktrack_core::{
    ClickEvent, DeviceCount, FieldUpdate, LinkSummary, ReferrerCount, ShortCode, ShortLink,
    SourceCount, StorageError, TimeseriesPoint,
};

pub(crate) const SELECT_LINK_BY_CODE: &str = r#"
    SELECT id, code, target_url, label, campaign, created_at, active
    FROM links
    WHERE code = ?
    LIMIT 1
"#;

pub(crate) const LINK_EXISTS: &str = r#"
    SELECT 1
    FROM links
    WHERE code = ?
    LIMIT 1
"#;

pub(crate) const INSERT_LINK: &str = r#"
    INSERT INTO links (code, target_url, label, campaign, created_at, active)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

pub(crate) const SET_ACTIVE: &str = r#"
    UPDATE links
    SET active = ?
    WHERE code = ?
"#;

pub(crate) const UPDATE_METADATA: &str = r#"
    UPDATE links
    SET label = CASE WHEN ? THEN ? ELSE label END,
        campaign = CASE WHEN ? THEN ? ELSE campaign END
    WHERE code = ?
"#;

pub(crate) const LIST_LINKS: &str = r#"
    SELECT l.id, l.code, l.target_url, l.label, l.campaign, l.created_at, l.active,
           COALESCE(c.total_clicks, 0) AS total_clicks,
           COALESCE(c.unique_visitors, 0) AS unique_visitors
    FROM links l
    LEFT JOIN (
        SELECT link_id,
               COUNT(*) AS total_clicks,
               COUNT(DISTINCT ip_address) AS unique_visitors
        FROM clicks
        GROUP BY link_id
    ) c ON c.link_id = l.id
    WHERE (? IS NULL OR l.campaign = ?)
      AND (? IS NULL OR l.active = ?)
    ORDER BY l.id DESC
    LIMIT ? OFFSET ?
"#;

pub(crate) const TOP_LINKS: &str = r#"
    SELECT l.id, l.code, l.target_url, l.label, l.campaign, l.created_at, l.active,
           COALESCE(c.total_clicks, 0) AS total_clicks,
           COALESCE(c.unique_visitors, 0) AS unique_visitors
    FROM links l
    LEFT JOIN (
        SELECT link_id,
               COUNT(*) AS total_clicks,
               COUNT(DISTINCT ip_address) AS unique_visitors
        FROM clicks
        GROUP BY link_id
    ) c ON c.link_id = l.id
    WHERE l.active = ?
    ORDER BY total_clicks DESC, l.id DESC
    LIMIT ?
"#;

pub(crate) const INSERT_CLICK: &str = r#"
    INSERT INTO clicks (link_id, ip_address, user_agent, referrer, source, clicked_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

pub(crate) const CLICK_TOTALS: &str = r#"
    SELECT COUNT(*) AS total_clicks,
           COUNT(DISTINCT ip_address) AS unique_visitors,
           COUNT(CASE WHEN source = ? THEN 1 END) AS qr_clicks,
           MIN(clicked_at) AS first_clicked_at,
           MAX(clicked_at) AS last_clicked_at
    FROM clicks
    WHERE link_id = ?
"#;

pub(crate) const CLICKS_BY_SOURCE: &str = r#"
    SELECT source,
           COUNT(*) AS clicks,
           COUNT(DISTINCT ip_address) AS unique_visitors
    FROM clicks
    WHERE link_id = ?
    GROUP BY source
    ORDER BY clicks DESC, source ASC
"#;

pub(crate) const TOP_REFERRERS: &str = r#"
    SELECT referrer, COUNT(*) AS clicks
    FROM clicks
    WHERE link_id = ?
      AND referrer IS NOT NULL
    GROUP BY referrer
    ORDER BY clicks DESC, referrer ASC
    LIMIT ?
"#;

pub(crate) const RECENT_CLICKS: &str = r#"
    SELECT id, link_id, ip_address, user_agent, referrer, source, clicked_at
    FROM clicks
    WHERE link_id = ?
    ORDER BY id DESC
    LIMIT ?
"#;

// `%` keeps the bucket start integral on MySQL, where `/` yields a decimal.
pub(crate) const CLICK_TIMESERIES: &str = r#"
    SELECT clicked_at - (clicked_at % ?) AS bucket_start,
           COUNT(*) AS clicks,
           COUNT(DISTINCT ip_address) AS unique_visitors
    FROM clicks
    WHERE link_id = ?
      AND clicked_at >= ?
    GROUP BY bucket_start
    ORDER BY bucket_start ASC
"#;

// Must agree with `linktrack_core::click::classify_device`.
pub(crate) const DEVICE_BREAKDOWN: &str = r#"
    SELECT CASE
               WHEN LOWER(user_agent) LIKE '%mobile%'
                 OR LOWER(user_agent) LIKE '%iphone%'
                 OR LOWER(user_agent) LIKE '%android%' THEN 'mobile'
               WHEN LOWER(user_agent) LIKE '%tablet%'
                 OR LOWER(user_agent) LIKE '%ipad%' THEN 'tablet'
               ELSE 'desktop'
           END AS device,
           COUNT(*) AS clicks
    FROM clicks
    WHERE link_id = ?
    GROUP BY device
    ORDER BY clicks DESC, device ASC
"#;

pub(crate) const OVERVIEW: &str = r#"
    SELECT (SELECT COUNT(*) FROM links) AS total_links,
           (SELECT COUNT(*) FROM links WHERE active = ?) AS active_links,
           (SELECT COUNT(*) FROM clicks) AS total_clicks,
           (SELECT COUNT(DISTINCT ip_address) FROM clicks) AS unique_visitors,
           (SELECT COUNT(*) FROM clicks WHERE clicked_at >= ?) AS clicks_since,
           (SELECT COUNT(*) FROM links WHERE created_at >= ?) AS links_created_since
"#;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LinkRow {
    id: i64,
    code: String,
    target_url: String,
    label: Option<String>,
    campaign: Option<String>,
    created_at: i64,
    active: bool,
}

impl LinkRow {
    pub(crate) fn into_link(self) -> Result<ShortLink> {
        Ok(ShortLink {
            id: self.id,
            code: ShortCode::new_unchecked(self.code),
            target_url: self.target_url,
            label: self.label,
            campaign: self.campaign,
            created_at: parse_timestamp(self.created_at)?,
            active: self.active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LinkSummaryRow {
    #[sqlx(flatten)]
    link: LinkRow,
    total_clicks: i64,
    unique_visitors: i64,
}

impl LinkSummaryRow {
    pub(crate) fn into_summary(self) -> Result<LinkSummary> {
        Ok(LinkSummary {
            link: self.link.into_link()?,
            total_clicks: self.total_clicks,
            unique_visitors: self.unique_visitors,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ClickRow {
    id: i64,
    link_id: i64,
    ip_address: Option<String>,
    user_agent: Option<String>,
    referrer: Option<String>,
    source: String,
    clicked_at: i64,
}

impl ClickRow {
    pub(crate) fn into_click(self) -> Result<ClickEvent> {
        Ok(ClickEvent {
            id: self.id,
            link_id: self.link_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            referrer: self.referrer,
            source: self.source,
            clicked_at: parse_timestamp(self.clicked_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ClickTotalsRow {
    pub(crate) total_clicks: i64,
    pub(crate) unique_visitors: i64,
    pub(crate) qr_clicks: i64,
    pub(crate) first_clicked_at: Option<i64>,
    pub(crate) last_clicked_at: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SourceCountRow {
    source: String,
    clicks: i64,
    unique_visitors: i64,
}

impl From<SourceCountRow> for SourceCount {
    fn from(row: SourceCountRow) -> Self {
        SourceCount {
            source: row.source,
            clicks: row.clicks,
            unique_visitors: row.unique_visitors,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ReferrerCountRow {
    referrer: String,
    clicks: i64,
}

impl From<ReferrerCountRow> for ReferrerCount {
    fn from(row: ReferrerCountRow) -> Self {
        ReferrerCount {
            referrer: row.referrer,
            clicks: row.clicks,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TimeseriesRow {
    bucket_start: i64,
    clicks: i64,
    unique_visitors: i64,
}

impl TimeseriesRow {
    pub(crate) fn into_point(self) -> Result<TimeseriesPoint> {
        Ok(TimeseriesPoint {
            bucket_start: parse_timestamp(self.bucket_start)?,
            clicks: self.clicks,
            unique_visitors: self.unique_visitors,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DeviceCountRow {
    device: String,
    clicks: i64,
}

impl From<DeviceCountRow> for DeviceCount {
    fn from(row: DeviceCountRow) -> Self {
        DeviceCount {
            device: row.device,
            clicks: row.clicks,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OverviewRow {
    pub(crate) total_links: i64,
    pub(crate) active_links: i64,
    pub(crate) total_clicks: i64,
    pub(crate) unique_visitors: i64,
    pub(crate) clicks_since: i64,
    pub(crate) links_created_since: i64,
}

/// Current time truncated to the second, the resolution stored in the tables.
pub(crate) fn now() -> Result<Timestamp> {
    parse_timestamp(Timestamp::now().as_second())
}

pub(crate) fn parse_timestamp(seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid timestamp '{}': {e}", seconds))
    })
}

pub(crate) fn parse_optional_timestamp(seconds: Option<i64>) -> Result<Option<Timestamp>> {
    seconds.map(parse_timestamp).transpose()
}

/// Splits a [`FieldUpdate`] into the `(should_write, value)` pair bound by
/// [`UPDATE_METADATA`].
pub(crate) fn field_params(update: FieldUpdate<String>) -> (bool, Option<String>) {
    match update {
        FieldUpdate::Keep => (false, None),
        FieldUpdate::Clear => (true, None),
        FieldUpdate::Set(value) => (true, Some(value)),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

pub(crate) fn map_migrate_error(err: sqlx::migrate::MigrateError) -> StorageError {
    StorageError::Operation(format!("schema migration failed: {err}"))
}

/// Implements the repository traits for a struct holding a sqlx `pool` field.
///
/// `$last_insert_id` reads the surrogate key assigned by the last `INSERT`
/// from the backend's query result.
macro_rules! impl_sql_repository {
    ($repo:ty, $last_insert_id:path) => {
        #[async_trait::async_trait]
        impl linktrack_core::ReadRepository for $repo {
            async fn resolve(
                &self,
                code: &linktrack_core::ShortCode,
            ) -> linktrack_core::repository::Result<Option<linktrack_core::ShortLink>> {
                let row = sqlx::query_as::<_, $crate::sql::LinkRow>($crate::sql::SELECT_LINK_BY_CODE)
                    .bind(code.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                row.map($crate::sql::LinkRow::into_link).transpose()
            }

            async fn exists(
                &self,
                code: &linktrack_core::ShortCode,
            ) -> linktrack_core::repository::Result<bool> {
                let exists = sqlx::query($crate::sql::LINK_EXISTS)
                    .bind(code.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?
                    .is_some();

                Ok(exists)
            }
        }

        #[async_trait::async_trait]
        impl linktrack_core::Repository for $repo {
            async fn create(
                &self,
                link: linktrack_core::NewLink,
            ) -> linktrack_core::repository::Result<linktrack_core::ShortLink> {
                let created_at = $crate::sql::now()?;

                let result = sqlx::query($crate::sql::INSERT_LINK)
                    .bind(link.code.as_str())
                    .bind(link.target_url.as_str())
                    .bind(link.label.as_deref())
                    .bind(link.campaign.as_deref())
                    .bind(created_at.as_second())
                    .bind(true)
                    .execute(&self.pool)
                    .await;

                let result = match result {
                    Ok(result) => result,
                    Err(err) if $crate::sql::is_unique_violation(&err) => {
                        return Err(linktrack_core::StorageError::Conflict(link.code.to_string()));
                    }
                    Err(err) => return Err($crate::sql::map_sqlx_error(err)),
                };

                Ok(linktrack_core::ShortLink {
                    id: $last_insert_id(&result)?,
                    code: link.code,
                    target_url: link.target_url,
                    label: link.label,
                    campaign: link.campaign,
                    created_at,
                    active: true,
                })
            }

            async fn set_active(
                &self,
                code: &linktrack_core::ShortCode,
                active: bool,
            ) -> linktrack_core::repository::Result<Option<linktrack_core::ShortLink>> {
                sqlx::query($crate::sql::SET_ACTIVE)
                    .bind(active)
                    .bind(code.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                // MySQL reports zero affected rows for no-op updates, so the
                // row is read back instead of trusting `rows_affected`.
                <Self as linktrack_core::ReadRepository>::resolve(self, code).await
            }

            async fn update(
                &self,
                code: &linktrack_core::ShortCode,
                update: linktrack_core::LinkUpdate,
            ) -> linktrack_core::repository::Result<Option<linktrack_core::ShortLink>> {
                if !update.is_empty() {
                    let (write_label, label) = $crate::sql::field_params(update.label);
                    let (write_campaign, campaign) = $crate::sql::field_params(update.campaign);

                    sqlx::query($crate::sql::UPDATE_METADATA)
                        .bind(write_label)
                        .bind(label)
                        .bind(write_campaign)
                        .bind(campaign)
                        .bind(code.as_str())
                        .execute(&self.pool)
                        .await
                        .map_err($crate::sql::map_sqlx_error)?;
                }

                <Self as linktrack_core::ReadRepository>::resolve(self, code).await
            }

            async fn list(
                &self,
                filter: &linktrack_core::LinkFilter,
            ) -> linktrack_core::repository::Result<Vec<linktrack_core::LinkSummary>> {
                let rows = sqlx::query_as::<_, $crate::sql::LinkSummaryRow>($crate::sql::LIST_LINKS)
                    .bind(filter.campaign.as_deref())
                    .bind(filter.campaign.as_deref())
                    .bind(filter.active)
                    .bind(filter.active)
                    .bind(i64::from(filter.limit))
                    .bind(i64::from(filter.offset))
                    .fetch_all(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                rows.into_iter()
                    .map($crate::sql::LinkSummaryRow::into_summary)
                    .collect()
            }
        }

        #[async_trait::async_trait]
        impl linktrack_core::ClickRepository for $repo {
            async fn record_click(
                &self,
                click: linktrack_core::NewClick,
            ) -> linktrack_core::repository::Result<linktrack_core::ClickEvent> {
                let clicked_at = $crate::sql::now()?;

                let result = sqlx::query($crate::sql::INSERT_CLICK)
                    .bind(click.link_id)
                    .bind(click.ip_address.as_deref())
                    .bind(click.user_agent.as_deref())
                    .bind(click.referrer.as_deref())
                    .bind(click.source.as_str())
                    .bind(clicked_at.as_second())
                    .execute(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                Ok(linktrack_core::ClickEvent {
                    id: $last_insert_id(&result)?,
                    link_id: click.link_id,
                    ip_address: click.ip_address,
                    user_agent: click.user_agent,
                    referrer: click.referrer,
                    source: click.source,
                    clicked_at,
                })
            }

            async fn link_stats(
                &self,
                link_id: i64,
            ) -> linktrack_core::repository::Result<linktrack_core::LinkStats> {
                let totals = sqlx::query_as::<_, $crate::sql::ClickTotalsRow>($crate::sql::CLICK_TOTALS)
                    .bind(linktrack_core::click::QR_SOURCE)
                    .bind(link_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                let sources = sqlx::query_as::<_, $crate::sql::SourceCountRow>($crate::sql::CLICKS_BY_SOURCE)
                    .bind(link_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                let referrers = sqlx::query_as::<_, $crate::sql::ReferrerCountRow>($crate::sql::TOP_REFERRERS)
                    .bind(link_id)
                    .bind(i64::from(linktrack_core::click::TOP_REFERRERS_LIMIT))
                    .fetch_all(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                Ok(linktrack_core::LinkStats {
                    total_clicks: totals.total_clicks,
                    unique_visitors: totals.unique_visitors,
                    qr_clicks: totals.qr_clicks,
                    first_clicked_at: $crate::sql::parse_optional_timestamp(totals.first_clicked_at)?,
                    last_clicked_at: $crate::sql::parse_optional_timestamp(totals.last_clicked_at)?,
                    sources: sources.into_iter().map(Into::into).collect(),
                    top_referrers: referrers.into_iter().map(Into::into).collect(),
                })
            }

            async fn recent_clicks(
                &self,
                link_id: i64,
                limit: u32,
            ) -> linktrack_core::repository::Result<Vec<linktrack_core::ClickEvent>> {
                let rows = sqlx::query_as::<_, $crate::sql::ClickRow>($crate::sql::RECENT_CLICKS)
                    .bind(link_id)
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                rows.into_iter().map($crate::sql::ClickRow::into_click).collect()
            }

            async fn timeseries(
                &self,
                link_id: i64,
                since: jiff::Timestamp,
                bucket: linktrack_core::TimeBucket,
            ) -> linktrack_core::repository::Result<Vec<linktrack_core::TimeseriesPoint>> {
                let rows = sqlx::query_as::<_, $crate::sql::TimeseriesRow>($crate::sql::CLICK_TIMESERIES)
                    .bind(bucket.seconds())
                    .bind(link_id)
                    .bind(since.as_second())
                    .fetch_all(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                rows.into_iter().map($crate::sql::TimeseriesRow::into_point).collect()
            }

            async fn device_breakdown(
                &self,
                link_id: i64,
            ) -> linktrack_core::repository::Result<Vec<linktrack_core::DeviceCount>> {
                let rows = sqlx::query_as::<_, $crate::sql::DeviceCountRow>($crate::sql::DEVICE_BREAKDOWN)
                    .bind(link_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                Ok(rows.into_iter().map(Into::into).collect())
            }

            async fn overview(
                &self,
                since: jiff::Timestamp,
            ) -> linktrack_core::repository::Result<linktrack_core::Overview> {
                let counts = sqlx::query_as::<_, $crate::sql::OverviewRow>($crate::sql::OVERVIEW)
                    .bind(true)
                    .bind(since.as_second())
                    .bind(since.as_second())
                    .fetch_one(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?;

                let top_links = sqlx::query_as::<_, $crate::sql::LinkSummaryRow>($crate::sql::TOP_LINKS)
                    .bind(true)
                    .bind(i64::from(linktrack_core::click::TOP_LINKS_LIMIT))
                    .fetch_all(&self.pool)
                    .await
                    .map_err($crate::sql::map_sqlx_error)?
                    .into_iter()
                    .map($crate::sql::LinkSummaryRow::into_summary)
                    .collect::<linktrack_core::repository::Result<Vec<_>>>()?;

                Ok(linktrack_core::Overview {
                    total_links: counts.total_links,
                    active_links: counts.active_links,
                    total_clicks: counts.total_clicks,
                    unique_visitors: counts.unique_visitors,
                    clicks_since: counts.clicks_since,
                    links_created_since: counts.links_created_since,
                    top_links,
                })
            }
        }
    };
}

pub(crate) use impl_sql_repository;
