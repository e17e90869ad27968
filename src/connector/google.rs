//! Google Translate connector (`translate_a/single`, `client=gtx`)

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::extract::{self, ExtractPolicy, Fields};
use super::http::SourceHttpClient;
use super::{ConnectorError, LanguagePair, SourceConnector};
use crate::orchestrator::outcome::Outcome;
use crate::orchestrator::RateLimiter;
use crate::word::WorkItem;

/// Public Google Translate endpoint
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://translate.googleapis.com";

const TRANSLATE_PATH: &str = "/translate_a/single";

/// Word used by liveness probes
const PROBE_WORD: &str = "hola";

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector producing translation-only payloads from Google Translate
pub struct GoogleTranslateConnector {
    http: SourceHttpClient,
    base_url: String,
    languages: LanguagePair,
    policy: ExtractPolicy,
}

impl GoogleTranslateConnector {
    /// Create a connector against the public endpoint
    pub fn new(
        client: Arc<Client>,
        rate_limiter: Arc<RateLimiter>,
        languages: LanguagePair,
    ) -> Self {
        Self {
            http: SourceHttpClient::new(client, rate_limiter, "google"),
            base_url: DEFAULT_GOOGLE_BASE_URL.to_string(),
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

    fn params(&self, text: &str) -> [(&'static str, String); 5] {
        [
            ("client", "gtx".to_string()),
            ("dt", "t".to_string()),
            ("sl", self.languages.source().to_string()),
            ("tl", self.languages.target().to_string()),
            ("q", text.to_string()),
        ]
    }

    /// Translate arbitrary text; used directly by other connectors as a fallback
    pub async fn translate(&self, text: &str, timeout: Duration) -> Result<Fields, ConnectorError> {
        let url = format!("{}{}", self.base_url, TRANSLATE_PATH);
        let data: Value = self.http.get_json(&url, &self.params(text), timeout).await?;
        Ok(Fields::translation(extract::google_translation(&data)))
    }
}

#[async_trait]
impl SourceConnector for GoogleTranslateConnector {
    fn name(&self) -> &str {
        "google"
    }

    async fn fetch(&self, item: &WorkItem, timeout: Duration) -> Outcome {
        match self.translate(item.key.as_str(), timeout).await {
            Ok(fields) => self.policy.assemble(&item.key, fields),
            Err(e) => {
                debug!(key = %item.key, error = %e, "Google request failed");
                Outcome::Failure(e.failure_reason())
            }
        }
    }

    async fn probe(&self) -> bool {
        let url = format!("{}{}", self.base_url, TRANSLATE_PATH);
        self.http.probe(&url, &self.params(PROBE_WORD), PROBE_TIMEOUT).await
    }
}

impl std::fmt::Debug for GoogleTranslateConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslateConnector")
            .field("base_url", &self.base_url)
            .field("languages", &self.languages)
            .finish()
    }
}
