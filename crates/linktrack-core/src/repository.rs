use crate::click::{
    ClickEvent, DeviceCount, LinkStats, NewClick, Overview, TimeBucket, TimeseriesPoint,
};
use crate::error::StorageError;
use crate::link::{LinkFilter, LinkSummary, LinkUpdate, NewLink, ShortLink};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A read-only view of the link store.
///
/// This trait provides only the lookups from [`Repository`], which is all
/// the redirect path needs.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the link for a given short code, active or not.
    /// Returns `None` if the code was never issued.
    async fn resolve(&self, code: &ShortCode) -> Result<Option<ShortLink>>;

    /// Checks whether a short code was ever issued, including deactivated links.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new active link.
    ///
    /// Uniqueness of the code is enforced by the backend itself; a duplicate
    /// returns `Err(StorageError::Conflict)` even when a concurrent writer
    /// passed the same [`ReadRepository::exists`] check.
    async fn create(&self, link: NewLink) -> Result<ShortLink>;

    /// Sets the active flag. Returns `None` if the code does not exist.
    async fn set_active(&self, code: &ShortCode, active: bool) -> Result<Option<ShortLink>>;

    /// Edits label and campaign. Returns `None` if the code does not exist.
    async fn update(&self, code: &ShortCode, update: LinkUpdate) -> Result<Option<ShortLink>>;

    /// Lists links, newest first, with their click counts.
    async fn list(&self, filter: &LinkFilter) -> Result<Vec<LinkSummary>>;
}

/// Append-only click log and the aggregate queries over it.
#[async_trait]
pub trait ClickRepository: Send + Sync + 'static {
    async fn record_click(&self, click: NewClick) -> Result<ClickEvent>;

    /// Aggregates every click of one link.
    async fn link_stats(&self, link_id: i64) -> Result<LinkStats>;

    /// Most recent clicks of one link, newest first.
    async fn recent_clicks(&self, link_id: i64, limit: u32) -> Result<Vec<ClickEvent>>;

    /// Clicks of one link at or after `since`, grouped into UTC-aligned
    /// buckets, oldest first.
    async fn timeseries(
        &self,
        link_id: i64,
        since: Timestamp,
        bucket: TimeBucket,
    ) -> Result<Vec<TimeseriesPoint>>;

    /// Clicks of one link per device class, highest first.
    async fn device_breakdown(&self, link_id: i64) -> Result<Vec<DeviceCount>>;

    async fn overview(&self, since: Timestamp) -> Result<Overview>;
}
