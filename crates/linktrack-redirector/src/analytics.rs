use std::sync::Arc;

use crate::{RedirectorError, Result};
use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use linktrack_core::{
    ClickEvent, ClickRepository, DeviceCount, LinkStats, Overview, ReadRepository, ShortCode,
    ShortLink, TimeBucket, TimeseriesPoint,
};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing::trace;

/// Default number of clicks returned by [`Analytics::recent_clicks`].
pub const DEFAULT_RECENT_CLICKS: u32 = 50;
/// Upper bound for [`Analytics::recent_clicks`].
pub const MAX_RECENT_CLICKS: u32 = 200;

/// Days of history in [`LinkReport::daily`], counting back from today.
pub const DAILY_HISTORY_DAYS: i64 = 30;

/// A link together with its aggregate click statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkReport {
    pub link: ShortLink,
    pub stats: LinkStats,
    pub devices: Vec<DeviceCount>,
    /// Per-day clicks over the last [`DAILY_HISTORY_DAYS`] days.
    pub daily: Vec<TimeseriesPoint>,
}

/// Window covered by a click time series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Period {
    #[serde(rename = "24h")]
    Last24Hours,
    #[default]
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
}

#[derive(Debug, Error)]
#[error("unknown period '{0}', expected one of 24h, 7d, 30d")]
pub struct UnknownPeriod(pub String);

impl Period {
    /// Hourly buckets for the last day, daily buckets otherwise.
    pub fn bucket(self) -> TimeBucket {
        match self {
            Period::Last24Hours => TimeBucket::Hour,
            Period::Last7Days | Period::Last30Days => TimeBucket::Day,
        }
    }

    /// First instant included in the series ending at `now`.
    ///
    /// Day periods start at midnight UTC so the oldest bucket is complete.
    pub fn since(self, now: Timestamp) -> Timestamp {
        match self {
            Period::Last24Hours => now - SignedDuration::from_hours(24),
            Period::Last7Days => days_back(now, 7),
            Period::Last30Days => days_back(now, 30),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Last24Hours => "24h",
            Period::Last7Days => "7d",
            Period::Last30Days => "30d",
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Period::Last24Hours),
            "7d" => Ok(Period::Last7Days),
            "30d" => Ok(Period::Last30Days),
            other => Err(UnknownPeriod(other.to_string())),
        }
    }
}

fn days_back(now: Timestamp, days: i64) -> Timestamp {
    TimeBucket::Day.start_of(now) - SignedDuration::from_hours(24 * days)
}

/// Read-only queries over recorded clicks.
#[async_trait]
pub trait Analytics: Send + Sync + 'static {
    async fn link_report(&self, code: &ShortCode) -> Result<LinkReport>;

    /// Latest clicks of one link, newest first, at most [`MAX_RECENT_CLICKS`].
    async fn recent_clicks(&self, code: &ShortCode, limit: u32) -> Result<Vec<ClickEvent>>;

    /// Clicks of one link over `period`, oldest bucket first.
    async fn timeseries(&self, code: &ShortCode, period: Period) -> Result<Vec<TimeseriesPoint>>;

    /// System-wide totals; `clicks_since` and `links_created_since` count
    /// the current UTC day.
    async fn overview(&self) -> Result<Overview>;
}

#[derive(Debug)]
pub struct AnalyticsService<R> {
    repository: Arc<R>,
}

impl<R> Clone for AnalyticsService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: ReadRepository + ClickRepository> AnalyticsService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    async fn link(&self, code: &ShortCode) -> Result<ShortLink> {
        self.repository
            .resolve(code)
            .await?
            .ok_or_else(|| RedirectorError::NotFound(code.to_string()))
    }
}

#[async_trait]
impl<R: ReadRepository + ClickRepository> Analytics for AnalyticsService<R> {
    async fn link_report(&self, code: &ShortCode) -> Result<LinkReport> {
        let link = self.link(code).await?;
        let stats = self.repository.link_stats(link.id).await?;
        let devices = self.repository.device_breakdown(link.id).await?;
        let daily = self
            .repository
            .timeseries(
                link.id,
                days_back(Timestamp::now(), DAILY_HISTORY_DAYS),
                TimeBucket::Day,
            )
            .await?;
        trace!(code = %code, total_clicks = stats.total_clicks, "built link report");
        Ok(LinkReport {
            link,
            stats,
            devices,
            daily,
        })
    }

    async fn recent_clicks(&self, code: &ShortCode, limit: u32) -> Result<Vec<ClickEvent>> {
        let link = self.link(code).await?;
        let limit = limit.min(MAX_RECENT_CLICKS);
        Ok(self.repository.recent_clicks(link.id, limit).await?)
    }

    async fn timeseries(&self, code: &ShortCode, period: Period) -> Result<Vec<TimeseriesPoint>> {
        let link = self.link(code).await?;
        let since = period.since(Timestamp::now());
        Ok(self
            .repository
            .timeseries(link.id, since, period.bucket())
            .await?)
    }

    async fn overview(&self) -> Result<Overview> {
        let since = TimeBucket::Day.start_of(Timestamp::now());
        Ok(self.repository.overview(since).await?)
    }
}
