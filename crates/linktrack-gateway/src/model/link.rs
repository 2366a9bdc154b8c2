use jiff::Timestamp;
use linktrack_core::{FieldUpdate, LinkFilter, LinkSummary, LinkUpdate, ShortLink, ShortenParams};
use serde::{Deserialize, Deserializer, Serialize};

/// Largest batch accepted by `POST /links/bulk`.
pub const MAX_BULK_ITEMS: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLinkRequest {
    #[serde(alias = "url")]
    pub target_url: String,
    #[serde(default, alias = "custom_name")]
    pub label: Option<String>,
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub custom_code: Option<String>,
}

impl From<CreateLinkRequest> for ShortenParams {
    fn from(request: CreateLinkRequest) -> Self {
        ShortenParams {
            target_url: request.target_url,
            label: request.label,
            campaign: request.campaign,
            custom_code: request.custom_code,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkResponse {
    pub id: i64,
    pub code: String,
    pub short_url: String,
    pub qr_url: String,
    pub target_url: String,
    pub label: Option<String>,
    pub campaign: Option<String>,
    pub active: bool,
    pub created_at: Timestamp,
}

impl LinkResponse {
    pub fn new(link: ShortLink, base_url: &str) -> Self {
        let short_url = link.code.to_url(base_url);
        let qr_url = format!("{base_url}/qr/{}", link.code);
        Self {
            id: link.id,
            code: link.code.into_inner(),
            short_url,
            qr_url,
            target_url: link.target_url,
            label: link.label,
            campaign: link.campaign,
            active: link.active,
            created_at: link.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkSummaryResponse {
    #[serde(flatten)]
    pub link: LinkResponse,
    pub total_clicks: i64,
    pub unique_visitors: i64,
}

impl LinkSummaryResponse {
    pub fn new(summary: LinkSummary, base_url: &str) -> Self {
        Self {
            link: LinkResponse::new(summary.link, base_url),
            total_clicks: summary.total_clicks,
            unique_visitors: summary.unique_visitors,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub urls: Vec<CreateLinkRequest>,
}

#[derive(Debug, Serialize)]
pub struct BulkItemResult {
    pub target_url: String,
    pub label: Option<String>,
    pub code: Option<String>,
    pub short_url: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub success_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkResponse {
    pub fn new(results: Vec<BulkItemResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failed_count: results.len() - success_count,
            total_count: results.len(),
            results,
        }
    }
}

/// `PATCH /links/{code}` body. An absent field is left alone, `null` clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLinkRequest {
    #[serde(default, deserialize_with = "present")]
    pub label: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub campaign: Option<Option<String>>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl UpdateLinkRequest {
    pub fn metadata(&self) -> LinkUpdate {
        LinkUpdate {
            label: field_update(&self.label),
            campaign: field_update(&self.campaign),
        }
    }
}

fn field_update(value: &Option<Option<String>>) -> FieldUpdate<String> {
    match value {
        None => FieldUpdate::Keep,
        Some(inner) => inner.clone().into(),
    }
}

/// Marks a field as present, so `null` deserializes to `Some(None)`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListLinksQuery {
    pub campaign: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<ListLinksQuery> for LinkFilter {
    fn from(query: ListLinksQuery) -> Self {
        let defaults = LinkFilter::default();
        LinkFilter {
            campaign: query.campaign.filter(|c| !c.is_empty()),
            active: query.active,
            limit: query.limit.unwrap_or(defaults.limit),
            offset: query.offset.unwrap_or(defaults.offset),
        }
    }
}
