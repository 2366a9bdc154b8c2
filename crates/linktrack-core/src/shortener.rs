use crate::error::ShortenerError;
use crate::link::{LinkFilter, LinkSummary, LinkUpdate, ShortLink};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, ShortenerError>;

/// Parameters for creating a shortened URL.
#[derive(Debug, Clone, Default)]
pub struct ShortenParams {
    /// The URL visitors are redirected to.
    pub target_url: String,
    pub label: Option<String>,
    pub campaign: Option<String>,
    /// Reserve this exact code instead of allocating a random one.
    pub custom_code: Option<String>,
}

impl ShortenParams {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = Some(campaign.into());
        self
    }

    pub fn with_custom_code(mut self, code: impl Into<String>) -> Self {
        self.custom_code = Some(code.into());
        self
    }
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a shortened URL and returns the stored link.
    async fn shorten(&self, params: ShortenParams) -> Result<ShortLink>;

    /// Creates several links; each item succeeds or fails on its own.
    /// Results are returned in input order.
    async fn shorten_many(&self, batch: Vec<ShortenParams>) -> Vec<Result<ShortLink>>;

    /// Returns the link for a code, active or not.
    async fn resolve(&self, code: &ShortCode) -> Result<Option<ShortLink>>;

    async fn set_active(&self, code: &ShortCode, active: bool) -> Result<ShortLink>;

    async fn update(&self, code: &ShortCode, update: LinkUpdate) -> Result<ShortLink>;

    async fn list(&self, filter: LinkFilter) -> Result<Vec<LinkSummary>>;
}
