use std::sync::Arc;

use crate::redirector::{RedirectOutcome, Redirector, Visit};
use crate::source::classify_source;
use async_trait::async_trait;
use linktrack_core::click::QR_SOURCE;
use linktrack_core::{ClickRepository, NewClick, ReadRepository, ShortCode};
use tracing::{debug, trace, warn};

/// Service for handling URL redirects.
///
/// Resolves codes through a read-only repository and appends one click per
/// successful redirect. Click recording is best effort: a failed insert is
/// logged and the redirect proceeds.
#[derive(Debug)]
pub struct RedirectorService<R> {
    repository: Arc<R>,
}

impl<R> Clone for RedirectorService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: ReadRepository + ClickRepository> RedirectorService<R> {
    /// Creates a new RedirectorService with the given repository.
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    async fn record(&self, link_id: i64, code: &ShortCode, visit: Visit) {
        let source = if visit.via_qr {
            QR_SOURCE.to_string()
        } else {
            classify_source(visit.referrer.as_deref(), &visit.query)
        };

        let click = NewClick::new(
            link_id,
            visit.ip_address,
            visit.user_agent,
            visit.referrer,
            source,
        );

        match self.repository.record_click(click).await {
            Ok(event) => {
                trace!(code = %code, click_id = event.id, source = %event.source, "recorded click");
            }
            Err(err) => {
                warn!(code = %code, link_id, error = %err, "failed to record click");
            }
        }
    }
}

#[async_trait]
impl<R: ReadRepository + ClickRepository> Redirector for RedirectorService<R> {
    async fn redirect(&self, code: &ShortCode, visit: Visit) -> crate::Result<RedirectOutcome> {
        trace!(code = %code, "resolving short code");

        let Some(link) = self.repository.resolve(code).await? else {
            trace!(code = %code, "short code not found");
            return Ok(RedirectOutcome::NotFound);
        };

        if !link.active {
            debug!(code = %code, "short code is deactivated");
            return Ok(RedirectOutcome::Gone);
        }

        self.record(link.id, code, visit).await;

        debug!(code = %code, url = %link.target_url, "resolved short code");
        Ok(RedirectOutcome::Redirect {
            link_id: link.id,
            target_url: link.target_url,
        })
    }
}
