//! Glosbe word-page connector
//!
//! Scrapes `glosbe.com/{source}/{target}/{word}` for translations, grammar
//! attributes, a pronunciation file and one example sentence pair.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::extract::{self, ExtractPolicy};
use super::http::SourceHttpClient;
use super::{ConnectorError, LanguagePair, SourceConnector};
use crate::orchestrator::outcome::{FailureReason, Outcome};
use crate::orchestrator::RateLimiter;
use crate::word::WorkItem;

/// Public Glosbe site; also the host of the audio files
pub const DEFAULT_GLOSBE_PAGE_BASE_URL: &str = "https://glosbe.com";

const HEALTH_CHECK_WORD: &str = "hola";

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector producing full payloads from Glosbe word pages
pub struct GlosbePageConnector {
    http: SourceHttpClient,
    base_url: String,
    languages: LanguagePair,
    policy: ExtractPolicy,
}

impl GlosbePageConnector {
    /// Create a connector against the public site
    pub fn new(
        client: Arc<Client>,
        rate_limiter: Arc<RateLimiter>,
        languages: LanguagePair,
    ) -> Self {
        Self {
            http: SourceHttpClient::new(client, rate_limiter, "glosbe-page"),
            base_url: DEFAULT_GLOSBE_PAGE_BASE_URL.to_string(),
            languages,
            policy: ExtractPolicy::default(),
        }
    }

    /// Point the connector at another host (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the extraction policy
    pub fn with_policy(mut self, policy: ExtractPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the connector-local retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.http = self.http.with_max_retries(max_retries);
        self
    }

    /// Page URL with the word as one percent-encoded path segment
    fn page_url(&self, word: &str) -> Result<Url, ConnectorError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ConnectorError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ConnectorError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend([self.languages.source(), self.languages.target(), word]);
        Ok(url)
    }

    async fn page(&self, word: &str, timeout: Duration) -> Result<String, ConnectorError> {
        let url = self.page_url(word)?;
        self.http.get_text(url.as_str(), &[], timeout).await
    }
}

#[async_trait]
impl SourceConnector for GlosbePageConnector {
    fn name(&self) -> &str {
        "glosbe-page"
    }

    async fn fetch(&self, item: &WorkItem, timeout: Duration) -> Outcome {
        match self.page(item.key.as_str(), timeout).await {
            Ok(html) => {
                let fields = extract::glosbe_page(&html, self.languages.source(), &self.base_url);
                self.policy.assemble(&item.key, fields)
            }
            // Glosbe answers unknown words with a 404 page
            Err(ConnectorError::Client(404)) => Outcome::Failure(FailureReason::NoData),
            Err(e) => {
                debug!(key = %item.key, error = %e, "Glosbe page request failed");
                Outcome::Failure(e.failure_reason())
            }
        }
    }

    async fn probe(&self) -> bool {
        match self.page_url(HEALTH_CHECK_WORD) {
            Ok(url) => self.http.probe(url.as_str(), &[], HEALTH_CHECK_TIMEOUT).await,
            Err(e) => {
                debug!(error = %e, "Glosbe page URL rejected");
                false
            }
        }
    }
}

impl std::fmt::Debug for GlosbePageConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlosbePageConnector")
            .field("base_url", &self.base_url)
            .field("languages", &self.languages)
            .finish()
    }
}
