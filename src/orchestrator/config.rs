//! Orchestrator configuration constants and backoff calculation

use std::time::Duration;

/// Words per batch. A checkpoint is written after every batch, so this is
/// also the most work a crash can throw away.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Concurrent fetches per batch.
pub const DEFAULT_CONCURRENCY: usize = 30;

/// Minimum spacing between two requests, across all workers (10 req/s).
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

/// Pause between batches.
pub const DEFAULT_INTER_BATCH_DELAY_MS: u64 = 100;

/// Per-request timeout handed to connectors.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// First throttle backoff step. Remote per-origin blocks usually last
/// minutes, not seconds.
pub const DEFAULT_THROTTLE_BASE_SECS: u64 = 60;

/// Throttle backoff cap (15 minutes).
pub const DEFAULT_THROTTLE_CAP_SECS: u64 = 900;

/// Backoff-and-probe rounds before rotating identity.
pub const DEFAULT_THROTTLE_ATTEMPTS: u32 = 3;

/// Throttle recoveries allowed in one run before throttled keys are
/// recorded as failures.
pub const DEFAULT_MAX_THROTTLE_RECOVERIES: u32 = 5;

/// Connector-local retries for transport errors.
pub const MAX_RETRIES: u32 = 3;

/// Initial connector-local retry delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Connector-local retry delay cap in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 8000;

/// Calculate connector-local exponential backoff
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// Backoff ladder used while recovering from throttling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Delay of the first attempt
    pub base: Duration,
    /// Upper bound of any single delay
    pub cap: Duration,
    /// Backoff-and-probe rounds before escalating
    pub attempts: u32,
}

impl ThrottlePolicy {
    /// Delay for the given zero-based attempt: `base * 2^attempt`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(DEFAULT_THROTTLE_BASE_SECS),
            cap: Duration::from_secs(DEFAULT_THROTTLE_CAP_SECS),
            attempts: DEFAULT_THROTTLE_ATTEMPTS,
        }
    }
}

/// Tunables for a [`BatchOrchestrator`](super::BatchOrchestrator) run
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Items per batch
    pub batch_size: usize,
    /// Worker count per batch (clamped to the batch size)
    pub concurrency: usize,
    /// Sleep between batches
    pub inter_batch_delay: Duration,
    /// Timeout handed to every connector call
    pub fetch_timeout: Duration,
    /// Throttle recovery ladder
    pub throttle: ThrottlePolicy,
    /// Maximum throttle recoveries per run
    pub max_throttle_recoveries: u32,
    /// Re-queue previously problematic keys (ahead of new keys)
    pub retry_problematic: bool,
}

impl OrchestratorConfig {
    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        self.concurrency.clamp(1, self.batch_size.max(1))
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            inter_batch_delay: Duration::from_millis(DEFAULT_INTER_BATCH_DELAY_MS),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            throttle: ThrottlePolicy::default(),
            max_throttle_recoveries: DEFAULT_MAX_THROTTLE_RECOVERIES,
            retry_problematic: true,
        }
    }
}
