use super::{LinkResponse, LinkSummaryResponse};
use linktrack_core::{DeviceCount, LinkStats, Overview, TimeBucket, TimeseriesPoint};
use linktrack_redirector::{LinkReport, Period};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct LinkStatsResponse {
    pub link: LinkResponse,
    #[serde(flatten)]
    pub stats: LinkStats,
    pub devices: Vec<DeviceCount>,
    pub daily: Vec<TimeseriesPoint>,
}

impl LinkStatsResponse {
    pub fn new(report: LinkReport, base_url: &str) -> Self {
        Self {
            link: LinkResponse::new(report.link, base_url),
            stats: report.stats,
            devices: report.devices,
            daily: report.daily,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClicksQuery {
    pub limit: Option<u32>,
}

/// `period` is one of `24h`, `7d` or `30d`; absent means `7d`.
#[derive(Debug, Default, Deserialize)]
pub struct TimeseriesQuery {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TimeseriesResponse {
    pub code: String,
    pub period: Period,
    pub bucket: TimeBucket,
    pub points: Vec<TimeseriesPoint>,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub total_links: i64,
    pub active_links: i64,
    pub total_clicks: i64,
    pub unique_visitors: i64,
    pub clicks_today: i64,
    pub links_created_today: i64,
    pub top_links: Vec<LinkSummaryResponse>,
}

impl OverviewResponse {
    pub fn new(overview: Overview, base_url: &str) -> Self {
        Self {
            total_links: overview.total_links,
            active_links: overview.active_links,
            total_clicks: overview.total_clicks,
            unique_visitors: overview.unique_visitors,
            clicks_today: overview.clicks_since,
            links_created_today: overview.links_created_since,
            top_links: overview
                .top_links
                .into_iter()
                .map(|summary| LinkSummaryResponse::new(summary, base_url))
                .collect(),
        }
    }
}
