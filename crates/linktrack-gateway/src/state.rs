use std::sync::Arc;

use linktrack_core::{ClickRepository, Repository, Shortener};
use linktrack_generator::Generator;
use linktrack_redirector::{Analytics, AnalyticsService, Redirector, RedirectorService};
use linktrack_shortener::{ShortenerService, DEFAULT_MAX_ATTEMPTS};
use typed_builder::TypedBuilder;

/// Settings shared by every handler.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StateOptions {
    /// Prefix of every short URL, without a trailing slash.
    #[builder(setter(into))]
    pub base_url: String,
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
    #[builder(default = false)]
    pub trust_proxy_headers: bool,
}

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    redirector: Arc<dyn Redirector>,
    analytics: Arc<dyn Analytics>,
    base_url: Arc<str>,
    trust_proxy_headers: bool,
}

impl AppState {
    /// Builds the services over a single shared repository.
    pub fn new<R, G>(repository: Arc<R>, generator: G, options: StateOptions) -> Self
    where
        R: Repository + ClickRepository,
        G: Generator,
    {
        let shortener = ShortenerService::new(Arc::clone(&repository), generator)
            .with_max_attempts(options.max_attempts);
        Self {
            shortener: Arc::new(shortener),
            redirector: Arc::new(RedirectorService::new(Arc::clone(&repository))),
            analytics: Arc::new(AnalyticsService::new(repository)),
            base_url: options.base_url.trim_end_matches('/').into(),
            trust_proxy_headers: options.trust_proxy_headers,
        }
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn redirector(&self) -> &dyn Redirector {
        self.redirector.as_ref()
    }

    pub fn analytics(&self) -> &dyn Analytics {
        self.analytics.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn trust_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }
}
