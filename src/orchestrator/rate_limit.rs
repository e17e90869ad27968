//! Minimum-interval rate limiting
//!
//! One [`RateLimiter`] is shared by every worker that talks to the same
//! remote endpoint. Grants are spaced by at least `min_interval` globally,
//! measured from the previous *grant*, not from when a caller last checked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::metrics;

/// Global minimum-interval limiter
///
/// The "read last grant, wait, record new grant" sequence runs under a
/// single async mutex. Tokio's mutex is fair, so concurrent callers are
/// granted in arrival order, each one a full interval after the previous.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
    grants: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter with the given steady-state interval
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_grant: Mutex::new(None),
            grants: AtomicU64::new(0),
        }
    }

    /// Create a limiter from a requests-per-second budget
    pub fn per_second(requests: u32) -> Self {
        let requests = requests.max(1);
        Self::new(Duration::from_secs(1) / requests)
    }

    /// Steady-state interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Number of grants issued so far
    pub fn grants(&self) -> u64 {
        self.grants.load(Ordering::Relaxed)
    }

    /// Wait for the next request slot
    pub async fn acquire(&self) {
        let requested = std::time::Instant::now();

        let mut last_grant = self.last_grant.lock().await;
        if let Some(previous) = *last_grant {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                sleep_until(ready_at).await;
            }
        }
        *last_grant = Some(Instant::now());
        drop(last_grant);

        let grants = self.grants.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_rate_limit_wait(requested.elapsed(), grants);
    }
}
