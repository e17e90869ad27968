//! Process-wide HTTP client
//!
//! Every connector shares one `reqwest::Client` so connection pooling works
//! across all workers. Rate limiters are not global: the CLI builds one per
//! run and hands it to the connector.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// HTTP connect timeout (seconds)
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Upper bound for any request; per-call timeouts are usually shorter
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("dict-builder/", env!("CARGO_PKG_VERSION"));

/// Global HTTP client shared by all connectors
pub static GLOBAL_HTTP_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            Client::new()
        });
    Arc::new(client)
});

/// Get the global HTTP client
pub fn global_http_client() -> Arc<Client> {
    GLOBAL_HTTP_CLIENT.clone()
}
