//! Cooperative stop requests
//!
//! A [`StopSignal`] is shared between the Ctrl+C handler and the
//! orchestrator. The orchestrator only looks at it between batches (and
//! while sleeping through throttle backoff), so an in-flight fetch is never
//! pre-empted and the checkpoint on disk always describes whole batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a stop signal
pub type SharedStop = Arc<StopSignal>;

/// One-shot, cloneable-by-Arc stop flag with async notification
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    /// Create a signal that has not been triggered
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared signal
    pub fn shared() -> SharedStop {
        Arc::new(Self::new())
    }

    /// Request a stop; wakes every waiter the first time it is called
    pub fn request_stop(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once a stop has been requested
    pub async fn stopped(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request_stop()
        // between the check and the await is not lost
        notified.as_mut().enable();
        if self.is_stop_requested() {
            return;
        }
        notified.await;
    }
}
