use crate::Result;
use async_trait::async_trait;
use linktrack_core::ShortCode;
use std::collections::HashMap;

/// Request metadata captured when a visitor follows a short link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visit {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// Query parameters of the short URL itself, used for source attribution.
    pub query: HashMap<String, String>,
    /// The visit came through the QR entry point.
    pub via_qr: bool,
}

/// Result of resolving a short code for a visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Send the visitor to `target_url`.
    Redirect { link_id: i64, target_url: String },
    /// The code was never issued.
    NotFound,
    /// The link exists but was deactivated.
    Gone,
}

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a short code and, for active links, records the click.
    ///
    /// Fails only when the code cannot be resolved. A click that cannot be
    /// stored still yields [`RedirectOutcome::Redirect`].
    async fn redirect(&self, code: &ShortCode, visit: Visit) -> Result<RedirectOutcome>;
}
