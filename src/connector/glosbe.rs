//! MyMemory translations with Glosbe example phrases
//!
//! Translation comes from MyMemory (`/get?q=..&langpair=sl|tl`), falling
//! back to Google Translate when MyMemory has nothing usable. Example
//! phrases come from Glosbe's similar-phrases API and are optional.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::extract::{self, ExtractPolicy, ExtractionError, Fields, MAX_EXAMPLES};
use super::google::GoogleTranslateConnector;
use super::http::SourceHttpClient;
use super::{ConnectorError, LanguagePair, SourceConnector};
use crate::orchestrator::outcome::Outcome;
use crate::orchestrator::RateLimiter;
use crate::word::{Key, WorkItem};

/// Public MyMemory endpoint
pub const DEFAULT_MYMEMORY_BASE_URL: &str = "https://api.mymemory.translated.net";

/// Public Glosbe internal API endpoint
pub const DEFAULT_GLOSBE_BASE_URL: &str = "https://iapi.glosbe.com";

const MYMEMORY_PATH: &str = "/get";
const SIMILAR_PHRASES_PATH: &str = "/iapi3/similar/similarPhrasesMany";

const SEARCH_CRITERIA: &str = "WORDLIST-ALPHABETICALLY-3-s;PREFIX-PRIORITY-3-s;\
TRANSLITERATED-PRIORITY-3-s;FUZZY-PRIORITY-3-s;WORDLIST-ALPHABETICALLY-3-r;\
PREFIX-PRIORITY-3-r;TRANSLITERATED-PRIORITY-3-r;FUZZY-PRIORITY-3-r";

const PROBE_WORD: &str = "hola";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector producing translations with example phrases
pub struct GlosbeConnector {
    http: SourceHttpClient,
    mymemory_base_url: String,
    glosbe_base_url: String,
    languages: LanguagePair,
    policy: ExtractPolicy,
    fallback: Option<GoogleTranslateConnector>,
    max_examples: usize,
}

impl GlosbeConnector {
    /// Create a connector against the public endpoints, with Google fallback
    pub fn new(
        client: Arc<Client>,
        rate_limiter: Arc<RateLimiter>,
        languages: LanguagePair,
    ) -> Self {
        let fallback = GoogleTranslateConnector::new(
            client.clone(),
            rate_limiter.clone(),
            languages.clone(),
        );
        Self {
            http: SourceHttpClient::new(client, rate_limiter, "glosbe"),
            mymemory_base_url: DEFAULT_MYMEMORY_BASE_URL.to_string(),
            glosbe_base_url: DEFAULT_GLOSBE_BASE_URL.to_string(),
            languages,
            policy: ExtractPolicy::default(),
            fallback: Some(fallback),
            max_examples: MAX_EXAMPLES,
        }
    }

    /// Point MyMemory requests at another host
    pub fn with_mymemory_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.mymemory_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Point Glosbe requests at another host
    pub fn with_glosbe_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.glosbe_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Point the Google fallback at another host
    pub fn with_google_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.fallback = self.fallback.map(|g| g.with_base_url(base_url));
        self
    }

    /// Disable the Google Translate fallback
    pub fn without_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }

    /// Override the extraction policy
    pub fn with_policy(mut self, policy: ExtractPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the connector-local retry count (fallback included)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.http = self.http.with_max_retries(max_retries);
        self.fallback = self.fallback.map(|g| g.with_max_retries(max_retries));
        self
    }

    fn mymemory_params(&self, text: &str) -> [(&'static str, String); 2] {
        [("q", text.to_string()), ("langpair", self.languages.to_string())]
    }

    async fn mymemory_translation(
        &self,
        key: &Key,
        timeout: Duration,
    ) -> Result<Result<String, ExtractionError>, ConnectorError> {
        let url = format!("{}{}", self.mymemory_base_url, MYMEMORY_PATH);
        let data: Value = self
            .http
            .get_json(&url, &self.mymemory_params(key.as_str()), timeout)
            .await?;
        Ok(extract::mymemory_translation(&data, self.languages.target()))
    }

    async fn translation(
        &self,
        key: &Key,
        timeout: Duration,
    ) -> Result<Result<String, ExtractionError>, ConnectorError> {
        let primary = self.mymemory_translation(key, timeout).await;
        let needs_fallback = !matches!(primary, Ok(Ok(_)) | Err(ConnectorError::Throttled));
        let Some(fallback) = self.fallback.as_ref().filter(|_| needs_fallback) else {
            return primary;
        };

        match &primary {
            Ok(Err(e)) => {
                debug!(key = %key, error = %e, "MyMemory had no translation, trying Google")
            }
            Err(e) => debug!(key = %key, error = %e, "MyMemory request failed, trying Google"),
            Ok(Ok(_)) => {}
        }

        match fallback.translate(key.as_str(), timeout).await {
            Ok(fields) => {
                if fields.translation.is_ok() {
                    info!(key = %key, "Translation from Google fallback");
                }
                Ok(fields.translation)
            }
            Err(ConnectorError::Throttled) => Err(ConnectorError::Throttled),
            // The primary result is more informative than a second failure
            Err(_) => primary,
        }
    }

    /// Example phrases; only a throttle escapes as a request error
    async fn examples(
        &self,
        key: &Key,
        timeout: Duration,
    ) -> Result<Result<Vec<String>, ExtractionError>, ConnectorError> {
        let url = format!("{}{}", self.glosbe_base_url, SIMILAR_PHRASES_PATH);
        let params = [
            ("p", key.as_str().to_string()),
            ("l1", self.languages.source().to_string()),
            ("l2", self.languages.target().to_string()),
            ("removeDuplicates", "true".to_string()),
            ("searchCriteria", SEARCH_CRITERIA.to_string()),
            ("env", "en".to_string()),
        ];
        match self.http.get_json::<Value>(&url, &params, timeout).await {
            Ok(data) => Ok(extract::similar_phrases(&data, key, self.max_examples)),
            Err(ConnectorError::Throttled) => Err(ConnectorError::Throttled),
            Err(e) => Ok(Err(ExtractionError::Unavailable {
                field: "examples",
                reason: e.to_string(),
            })),
        }
    }
}

#[async_trait]
impl SourceConnector for GlosbeConnector {
    fn name(&self) -> &str {
        "glosbe"
    }

    async fn fetch(&self, item: &WorkItem, timeout: Duration) -> Outcome {
        let translation = match self.translation(&item.key, timeout).await {
            Ok(translation) => translation,
            Err(e) => {
                debug!(key = %item.key, error = %e, "Translation request failed");
                return Outcome::Failure(e.failure_reason());
            }
        };

        // Examples are only worth a request when the word has a translation
        let fields = match translation {
            Ok(text) => match self.examples(&item.key, timeout).await {
                Ok(examples) => Fields::translation(Ok(text)).with_examples(examples),
                Err(e) => {
                    debug!(key = %item.key, error = %e, "Example request failed");
                    return Outcome::Failure(e.failure_reason());
                }
            },
            Err(e) => Fields::translation(Err(e)),
        };
        self.policy.assemble(&item.key, fields)
    }

    async fn probe(&self) -> bool {
        let url = format!("{}{}", self.mymemory_base_url, MYMEMORY_PATH);
        self.http
            .probe(&url, &self.mymemory_params(PROBE_WORD), PROBE_TIMEOUT)
            .await
    }
}

impl std::fmt::Debug for GlosbeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlosbeConnector")
            .field("mymemory_base_url", &self.mymemory_base_url)
            .field("glosbe_base_url", &self.glosbe_base_url)
            .field("languages", &self.languages)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
