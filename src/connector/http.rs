//! Rate-limited HTTP helper shared by the connectors
//!
//! - Every attempt (including retries) waits for a rate limiter grant
//! - Network errors, timeouts and 5xx responses are retried locally with
//!   exponential backoff
//! - 429 is returned immediately: throttle recovery is global and belongs
//!   to the orchestrator
//! - Other 4xx responses and undecodable bodies are never retried

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::ConnectorError;
use crate::metrics::{self, HttpRequestMetrics};
use crate::orchestrator::config::{calculate_backoff, MAX_RETRIES};
use crate::orchestrator::RateLimiter;

/// HTTP client bound to one source and one rate limiter
#[derive(Clone)]
pub struct SourceHttpClient {
    client: Arc<Client>,
    rate_limiter: Arc<RateLimiter>,
    source: &'static str,
    max_retries: u32,
}

impl SourceHttpClient {
    /// Create a client for the named source
    pub fn new(client: Arc<Client>, rate_limiter: Arc<RateLimiter>, source: &'static str) -> Self {
        Self {
            client,
            rate_limiter,
            source,
            max_retries: MAX_RETRIES,
        }
    }

    /// Override the connector-local retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Shared rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// GET `url` with query `params` and decode the JSON body
    pub async fn get_json<T>(
        &self,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, ConnectorError>
    where
        T: DeserializeOwned,
    {
        self.send_with_retry(url, params, timeout)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ConnectorError::Decode(e.to_string()))
    }

    /// GET `url` with query `params` and return the body as text
    pub async fn get_text(
        &self,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<String, ConnectorError> {
        self.send_with_retry(url, params, timeout)
            .await?
            .text()
            .await
            .map_err(|e| ConnectorError::Decode(e.to_string()))
    }

    async fn send_with_retry(
        &self,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<reqwest::Response, ConnectorError> {
        let mut attempt = 0;
        loop {
            match self.send_once(url, params, timeout, attempt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = calculate_backoff(attempt);
                    warn!(
                        source = self.source,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    metrics::record_retry_backoff(backoff, attempt + 1);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single request; `true` on any 2xx response
    pub async fn probe(&self, url: &str, params: &[(&str, String)], timeout: Duration) -> bool {
        match self.send_once(url, params, timeout, 0).await {
            Ok(_) => true,
            Err(e) => {
                debug!(source = self.source, error = %e, "Probe failed");
                false
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
        attempt: u32,
    ) -> Result<reqwest::Response, ConnectorError> {
        self.rate_limiter.acquire().await;

        let request = HttpRequestMetrics::start(self.source, attempt);
        let response = match self
            .client
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                request.record_network_error();
                return Err(ConnectorError::from_reqwest(&e));
            }
        };

        let status = response.status();
        request.record_complete(status.as_u16());
        if status.is_success() {
            Ok(response)
        } else {
            Err(ConnectorError::from_status(status))
        }
    }
}
