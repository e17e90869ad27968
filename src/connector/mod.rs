//! Translation source connectors
//!
//! A connector performs one fetch for one word and reports an [`Outcome`].
//! Connectors never raise: transport problems, throttling and malformed
//! responses are all folded into a [`FailureReason`].

use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::orchestrator::outcome::{FailureReason, Outcome};
use crate::orchestrator::RateLimiter;
use crate::word::WorkItem;

pub mod extract;
pub mod glosbe;
pub mod glosbe_page;
pub mod google;
pub mod http;
pub mod shared_resources;

pub use extract::{ExtractPolicy, ExtractionError, Fields};
pub use glosbe::GlosbeConnector;
pub use glosbe_page::GlosbePageConnector;
pub use google::GoogleTranslateConnector;
pub use http::SourceHttpClient;

/// One pluggable data source
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Short source name for logs and metrics
    fn name(&self) -> &str;

    /// Fetch and extract data for one work item
    ///
    /// Must not panic or propagate transport errors; every problem maps to
    /// an `Outcome::Failure`.
    async fn fetch(&self, item: &WorkItem, timeout: Duration) -> Outcome;

    /// Cheap liveness request used while recovering from throttling
    ///
    /// Returns `true` when the source accepts requests again.
    async fn probe(&self) -> bool {
        true
    }
}

/// Errors raised inside connectors before classification
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// HTTP 429
    #[error("rate limit exceeded")]
    Throttled,

    /// HTTP 5xx
    #[error("server error: {0}")]
    Server(u16),

    /// HTTP 4xx other than 429
    #[error("client error: {0}")]
    Client(u16),

    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Connection or other transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("undecodable response: {0}")]
    Decode(String),

    /// Language code rejected before any request was made
    #[error("unsupported language code: '{0}'")]
    UnsupportedLanguage(String),

    /// Request URL could not be built
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl ConnectorError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::Throttled,
            code if status.is_server_error() => Self::Server(code),
            code => Self::Client(code),
        }
    }

    /// Classify a transport error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = err.status() {
            return Self::from_status(status);
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Network(err.to_string())
    }

    /// Whether a connector-local retry may help
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server(_) | Self::Timeout | Self::Network(_))
    }

    /// Failure reason reported to the orchestrator
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::Throttled => FailureReason::Throttled,
            Self::Server(_) | Self::Timeout | Self::Network(_) => FailureReason::TransportError,
            Self::Client(_)
            | Self::Decode(_)
            | Self::UnsupportedLanguage(_)
            | Self::InvalidUrl(_) => FailureReason::Invalid,
        }
    }
}

/// Source and target language codes (ISO 639-1 style, e.g. `es`, `ko`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    source: String,
    target: String,
}

impl LanguagePair {
    /// Validate and build a language pair
    pub fn new(source: &str, target: &str) -> Result<Self, ConnectorError> {
        Ok(Self {
            source: normalize_language(source)?,
            target: normalize_language(target)?,
        })
    }

    /// Language of the word list
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Language translations are produced in
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.source, self.target)
    }
}

fn normalize_language(code: &str) -> Result<String, ConnectorError> {
    let code = code.trim().to_ascii_lowercase();
    let valid = (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_lowercase());
    if valid {
        Ok(code)
    } else {
        Err(ConnectorError::UnsupportedLanguage(code))
    }
}

/// Available connectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConnectorKind {
    /// Google Translate (`translate_a/single`)
    Google,
    /// MyMemory translations plus Glosbe example phrases
    Glosbe,
    /// Glosbe word pages: translations, attributes, audio and a sentence
    GlosbePage,
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => f.write_str("google"),
            Self::Glosbe => f.write_str("glosbe"),
            Self::GlosbePage => f.write_str("glosbe-page"),
        }
    }
}

/// Construct a connector sharing the given rate limiter
pub fn create_connector(
    kind: ConnectorKind,
    languages: LanguagePair,
    rate_limiter: Arc<RateLimiter>,
    policy: ExtractPolicy,
    max_retries: u32,
) -> Arc<dyn SourceConnector> {
    let client = shared_resources::global_http_client();
    match kind {
        ConnectorKind::Google => Arc::new(
            GoogleTranslateConnector::new(client, rate_limiter, languages)
                .with_policy(policy)
                .with_max_retries(max_retries),
        ),
        ConnectorKind::Glosbe => Arc::new(
            GlosbeConnector::new(client, rate_limiter, languages)
                .with_policy(policy)
                .with_max_retries(max_retries),
        ),
        ConnectorKind::GlosbePage => Arc::new(
            GlosbePageConnector::new(client, rate_limiter, languages)
                .with_policy(policy)
                .with_max_retries(max_retries),
        ),
    }
}
