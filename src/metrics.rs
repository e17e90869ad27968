//! Run observability metrics
//!
//! Counters and histograms for fetch outcomes, throttle recoveries,
//! checkpoints, rate limiter waits and outgoing HTTP requests.
//!
//! Every helper goes through the `metrics` facade and does nothing until
//! [`init_metrics`] installs the Prometheus exporter (`--metrics-addr`).

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Serializes exporter installation
static INIT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the Prometheus exporter and describe every metric
///
/// Idempotent: later calls return immediately.
pub async fn init_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _guard = INIT_LOCK.lock().await;
    if METRICS_INITIALIZED.load(Ordering::SeqCst) {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!(%addr, "Initializing metrics exporter");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "fetch_outcomes_total",
        Unit::Count,
        "Terminal fetch outcomes recorded, by connector and outcome"
    );
    describe_counter!(
        "throttle_recoveries_total",
        Unit::Count,
        "Throttle recoveries, by how they ended"
    );
    describe_counter!(
        "checkpoints_total",
        Unit::Count,
        "Progress checkpoints written"
    );
    describe_gauge!(
        "progress_processed_words",
        Unit::Count,
        "Processed words in the current progress state"
    );
    describe_histogram!(
        "rate_limit_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for a rate limiter grant"
    );
    describe_counter!(
        "rate_limit_grants_total",
        Unit::Count,
        "Rate limiter grants issued"
    );
    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "HTTP requests sent to translation sources"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "HTTP 429 responses received"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Connector-local retry attempts"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration"
    );
    describe_histogram!(
        "http_retry_backoff_seconds",
        Unit::Seconds,
        "Backoff slept before a connector-local retry"
    );

    METRICS_INITIALIZED.store(true, Ordering::SeqCst);
    info!(%addr, "Metrics exporter ready");
    Ok(())
}

/// Whether [`init_metrics`] has completed
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.load(Ordering::SeqCst)
}

/// One outgoing HTTP request, from send to response
///
/// Every request counts towards `http_requests_total` and
/// `http_request_duration_seconds`, labelled by source and status.
pub struct HttpRequestMetrics {
    source: &'static str,
    attempt: u32,
    sent: Instant,
}

impl HttpRequestMetrics {
    /// Note that a request to `source` is being sent
    pub fn start(source: &'static str, attempt: u32) -> Self {
        debug!(source, attempt, "Sending request");
        Self {
            source,
            attempt,
            sent: Instant::now(),
        }
    }

    /// The source answered with `status_code`
    pub fn record_complete(&self, status_code: u16) {
        let elapsed = self.finish(status_code.to_string());
        if status_code == 429 {
            counter!("http_429_errors_total", "source" => self.source).increment(1);
            warn!(source = self.source, attempt = self.attempt, "Source is throttling (HTTP 429)");
        }
        debug!(
            source = self.source,
            status = status_code,
            elapsed_ms = elapsed.as_millis() as u64,
            "Response received"
        );
    }

    /// The request failed before any status arrived
    pub fn record_network_error(&self) {
        self.finish("network_error".to_string());
    }

    fn finish(&self, status: String) -> Duration {
        let elapsed = self.sent.elapsed();
        counter!("http_requests_total", "source" => self.source, "status" => status).increment(1);
        histogram!("http_request_duration_seconds", "source" => self.source)
            .record(elapsed.as_secs_f64());
        elapsed
    }
}

/// Record a connector-local retry and its backoff
pub fn record_retry_backoff(backoff: Duration, attempt: u32) {
    counter!("http_retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("http_retry_backoff_seconds").record(backoff.as_secs_f64());
}

/// Record how long a caller queued for a rate limiter grant
pub fn record_rate_limit_wait(wait: Duration, grants: u64) {
    histogram!("rate_limit_wait_seconds").record(wait.as_secs_f64());
    counter!("rate_limit_grants_total").increment(1);
    if wait > Duration::from_secs(1) {
        debug!(grants, wait_ms = wait.as_millis() as u64, "Slow rate limit grant");
    }
}

/// Record one terminal outcome
pub fn record_outcome(connector: &str, outcome: &'static str) {
    counter!(
        "fetch_outcomes_total",
        "connector" => connector.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Record how a throttle recovery ended
pub fn record_throttle_recovery(via: &'static str) {
    counter!("throttle_recoveries_total", "via" => via).increment(1);
}

/// Record a checkpoint write
pub fn record_checkpoint(processed: usize) {
    counter!("checkpoints_total").increment(1);
    gauge!("progress_processed_words").set(processed as f64);
}
