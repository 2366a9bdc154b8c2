use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Default page size for [`LinkFilter`].
pub const DEFAULT_LIST_LIMIT: u32 = 100;
/// Largest page size a listing returns.
pub const MAX_LIST_LIMIT: u32 = 500;

/// A persisted mapping from a short code to its target URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortLink {
    /// Surrogate key assigned by the store.
    pub id: i64,
    pub code: ShortCode,
    pub target_url: String,
    pub label: Option<String>,
    pub campaign: Option<String>,
    pub created_at: Timestamp,
    /// Inactive links keep their code and click history but stop redirecting.
    pub active: bool,
}

/// The fields needed to insert a new link. The store assigns `id`,
/// `created_at` and sets `active`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub code: ShortCode,
    pub target_url: String,
    pub label: Option<String>,
    pub campaign: Option<String>,
}

/// A change to a single optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Leave the stored value as it is.
    #[default]
    Keep,
    /// Reset the stored value to `None`.
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    /// Applies the update to the current value.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            FieldUpdate::Keep => current,
            FieldUpdate::Clear => None,
            FieldUpdate::Set(value) => Some(value),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// `Some` sets the value, `None` clears it.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Clear,
        }
    }
}

/// Metadata edit for an existing link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkUpdate {
    pub label: FieldUpdate<String>,
    pub campaign: FieldUpdate<String>,
}

impl LinkUpdate {
    pub fn is_empty(&self) -> bool {
        self.label.is_keep() && self.campaign.is_keep()
    }
}

/// Selection and paging for link listings. Results are ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFilter {
    pub campaign: Option<String>,
    pub active: Option<bool>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            campaign: None,
            active: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

/// A link together with its basic click counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSummary {
    pub link: ShortLink,
    pub total_clicks: i64,
    pub unique_visitors: i64,
}
