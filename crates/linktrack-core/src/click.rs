use crate::link::LinkSummary;
use jiff::Timestamp;
use serde::Serialize;

/// Source tag used when a visit carries no attribution signal.
pub const DEFAULT_SOURCE: &str = "direct";
/// Source tag for visits arriving through a QR code.
pub const QR_SOURCE: &str = "qr";

/// User agents and referrers longer than this are truncated before storage.
pub const MAX_HEADER_VALUE_CHARS: usize = 500;
/// Number of referrers reported in [`LinkStats::top_referrers`].
pub const TOP_REFERRERS_LIMIT: u32 = 10;
/// Number of links reported in [`Overview::top_links`].
pub const TOP_LINKS_LIMIT: u32 = 10;

pub const DEVICE_MOBILE: &str = "mobile";
pub const DEVICE_TABLET: &str = "tablet";
pub const DEVICE_DESKTOP: &str = "desktop";

const MOBILE_MARKERS: &[&str] = &["mobile", "iphone", "android"];
const TABLET_MARKERS: &[&str] = &["tablet", "ipad"];

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// One recorded visit through a short code. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickEvent {
    pub id: i64,
    pub link_id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub source: String,
    pub clicked_at: Timestamp,
}

/// A click about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClick {
    pub link_id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub source: String,
}

impl NewClick {
    /// Builds a click, dropping empty values and truncating oversized headers.
    pub fn new(
        link_id: i64,
        ip_address: Option<String>,
        user_agent: Option<String>,
        referrer: Option<String>,
        source: impl Into<String>,
    ) -> Self {
        let source = source.into();
        Self {
            link_id,
            ip_address: non_empty(ip_address),
            user_agent: non_empty(user_agent).map(truncate_chars),
            referrer: non_empty(referrer).map(truncate_chars),
            source: if source.is_empty() {
                DEFAULT_SOURCE.to_string()
            } else {
                source
            },
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn truncate_chars(value: String) -> String {
    match value.char_indices().nth(MAX_HEADER_VALUE_CHARS) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value,
    }
}

/// Guesses the device class from a user agent by substring.
///
/// Mobile markers are checked first, so an iPad announcing `Mobile` counts
/// as mobile. A missing user agent counts as desktop.
pub fn classify_device(user_agent: Option<&str>) -> &'static str {
    let Some(agent) = user_agent else {
        return DEVICE_DESKTOP;
    };
    let agent = agent.to_ascii_lowercase();

    if MOBILE_MARKERS.iter().any(|m| agent.contains(m)) {
        DEVICE_MOBILE
    } else if TABLET_MARKERS.iter().any(|m| agent.contains(m)) {
        DEVICE_TABLET
    } else {
        DEVICE_DESKTOP
    }
}

/// Width of one time series bucket. Buckets are aligned to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Hour,
    Day,
}

impl TimeBucket {
    pub fn seconds(self) -> i64 {
        match self {
            TimeBucket::Hour => SECONDS_PER_HOUR,
            TimeBucket::Day => SECONDS_PER_DAY,
        }
    }

    /// Start of the bucket containing `ts`.
    pub fn start_of(self, ts: Timestamp) -> Timestamp {
        let seconds = ts.as_second();
        Timestamp::from_second(seconds - seconds.rem_euclid(self.seconds())).unwrap_or(ts)
    }
}

/// Clicks that fell into one bucket. Empty buckets are not reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeseriesPoint {
    pub bucket_start: Timestamp,
    pub clicks: i64,
    pub unique_visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCount {
    /// One of [`DEVICE_MOBILE`], [`DEVICE_TABLET`] or [`DEVICE_DESKTOP`].
    pub device: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub clicks: i64,
    pub unique_visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferrerCount {
    pub referrer: String,
    pub clicks: i64,
}

/// Aggregate click counts for a single link.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkStats {
    pub total_clicks: i64,
    /// Distinct non-empty client IPs.
    pub unique_visitors: i64,
    pub qr_clicks: i64,
    pub first_clicked_at: Option<Timestamp>,
    pub last_clicked_at: Option<Timestamp>,
    /// Ordered by clicks, highest first.
    pub sources: Vec<SourceCount>,
    /// Ordered by clicks, highest first, at most [`TOP_REFERRERS_LIMIT`].
    pub top_referrers: Vec<ReferrerCount>,
}

/// System-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub total_links: i64,
    pub active_links: i64,
    pub total_clicks: i64,
    pub unique_visitors: i64,
    /// Clicks recorded at or after the `since` instant the overview was asked for.
    pub clicks_since: i64,
    /// Links created at or after the same instant.
    pub links_created_since: i64,
    pub top_links: Vec<LinkSummary>,
}
