use crate::validate;
use async_trait::async_trait;
use linktrack_core::link::MAX_LIST_LIMIT;
use linktrack_core::{
    LinkFilter, LinkSummary, LinkUpdate, NewLink, Repository, ShortCode, ShortLink, ShortenParams,
    Shortener, ShortenerError, StorageError,
};
use linktrack_generator::Generator;
use std::sync::Arc;
use tracing::{debug, trace, warn};

type Result<T> = std::result::Result<T, ShortenerError>;

/// Number of candidates drawn before allocation gives up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 50;

/// A validated link waiting for its code.
#[derive(Debug, Clone)]
struct Draft {
    target_url: String,
    label: Option<String>,
    campaign: Option<String>,
}

impl Draft {
    fn with_code(&self, code: ShortCode) -> NewLink {
        NewLink {
            code,
            target_url: self.target_url.clone(),
            label: self.label.clone(),
            campaign: self.campaign.clone(),
        }
    }
}

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `Generator` to handle:
/// - URL and metadata validation
/// - Random code allocation with a bounded retry budget
/// - Reservation of caller-chosen codes
/// - Administrative edits (activate, deactivate, relabel)
///
/// Uniqueness is ultimately enforced by the repository. The `exists` check
/// only avoids pointless inserts; a `Conflict` from `create` means another
/// writer won the race and the next candidate is tried.
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    max_attempts: usize,
}

impl<R, G> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            max_attempts: self.max_attempts,
        }
    }
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: Arc<R>, generator: G) -> Self {
        Self {
            repository,
            generator: Arc::new(generator),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides the allocation budget. Values below one are raised to one.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    fn draft(params: &ShortenParams) -> Result<Draft> {
        Ok(Draft {
            target_url: validate::target_url(&params.target_url)?,
            label: validate::optional_text(
                params.label.clone(),
                "label",
                validate::MAX_LABEL_CHARS,
            )?,
            campaign: validate::optional_text(
                params.campaign.clone(),
                "campaign",
                validate::MAX_CAMPAIGN_CHARS,
            )?,
        })
    }

    /// Draws candidates until one is inserted or the budget runs out.
    async fn allocate(&self, draft: &Draft) -> Result<ShortLink> {
        for attempt in 1..=self.max_attempts {
            let candidate: ShortCode = self.generator.generate().into();

            if validate::is_reserved(candidate.as_str()) {
                trace!(attempt, code = %candidate, "skipping reserved candidate");
                continue;
            }

            if self.repository.exists(&candidate).await? {
                debug!(attempt, code = %candidate, "candidate already issued");
                continue;
            }

            match self.repository.create(draft.with_code(candidate)).await {
                Ok(link) => {
                    debug!(attempt, code = %link.code, "allocated short code");
                    return Ok(link);
                }
                Err(StorageError::Conflict(code)) => {
                    debug!(attempt, %code, "candidate taken by a concurrent insert");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let attempts = self.max_attempts();
        warn!(
            attempts,
            space_size = ?self.generator.space_size(),
            "short code allocation exhausted"
        );
        Err(ShortenerError::AllocationExhausted { attempts })
    }

    /// Inserts a caller-chosen code. Never retried.
    async fn reserve(&self, code: ShortCode, draft: &Draft) -> Result<ShortLink> {
        match self.repository.create(draft.with_code(code)).await {
            Ok(link) => {
                debug!(code = %link.code, "reserved custom short code");
                Ok(link)
            }
            Err(StorageError::Conflict(code)) => Err(ShortenerError::CodeTaken(code)),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, params: ShortenParams) -> Result<ShortLink> {
        let draft = Self::draft(&params)?;

        match params.custom_code.as_deref() {
            Some(raw) => {
                let code = validate::custom_code(raw)?;
                self.reserve(code, &draft).await
            }
            None => self.allocate(&draft).await,
        }
    }

    async fn shorten_many(&self, batch: Vec<ShortenParams>) -> Vec<Result<ShortLink>> {
        let mut results = Vec::with_capacity(batch.len());
        for params in batch {
            results.push(self.shorten(params).await);
        }
        results
    }

    async fn resolve(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        Ok(self.repository.resolve(code).await?)
    }

    async fn set_active(&self, code: &ShortCode, active: bool) -> Result<ShortLink> {
        self.repository
            .set_active(code, active)
            .await?
            .ok_or_else(|| ShortenerError::NotFound(code.to_string()))
    }

    async fn update(&self, code: &ShortCode, update: LinkUpdate) -> Result<ShortLink> {
        let update = LinkUpdate {
            label: validate::text_update(update.label, "label", validate::MAX_LABEL_CHARS)?,
            campaign: validate::text_update(
                update.campaign,
                "campaign",
                validate::MAX_CAMPAIGN_CHARS,
            )?,
        };

        self.repository
            .update(code, update)
            .await?
            .ok_or_else(|| ShortenerError::NotFound(code.to_string()))
    }

    async fn list(&self, mut filter: LinkFilter) -> Result<Vec<LinkSummary>> {
        filter.limit = filter.limit.min(MAX_LIST_LIMIT);
        Ok(self.repository.list(&filter).await?)
    }
}
