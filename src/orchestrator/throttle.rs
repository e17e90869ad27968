//! Throttle recovery protocol
//!
//! Throttling is a property of the remote endpoint, not of a key, so the
//! recovery state lives in one place and is driven by the coordinating
//! task. The ladder is: exponential backoff with a probe after each wait,
//! then identity rotation, then a blocking operator checkpoint.
//!
//! Each successful recovery bumps an epoch. A throttled outcome from a
//! dispatch issued before the current epoch is simply re-queued; it does not
//! start a second ladder.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::connector::SourceConnector;
use crate::metrics;
use crate::orchestrator::config::ThrottlePolicy;
use crate::orchestrator::rotation::IdentityRotation;
use crate::shutdown::SharedStop;

/// Blocking escalation point when automatic recovery fails
#[async_trait]
pub trait OperatorGate: Send + Sync {
    /// Block until the operator confirms the endpoint is reachable again
    ///
    /// Returns `false` when the operator cannot or will not confirm (e.g. the
    /// input stream closed); the run then stops at the batch boundary.
    async fn wait_for_operator(&self, reason: &str) -> bool;
}

/// Operator gate that prompts on stderr and waits for Enter on stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinOperatorGate;

#[async_trait]
impl OperatorGate for StdinOperatorGate {
    async fn wait_for_operator(&self, reason: &str) -> bool {
        eprintln!();
        eprintln!("All automatic recovery methods failed: {reason}");
        eprintln!("Switch your network location manually, then press Enter to continue.");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(0) => {
                warn!("Operator input closed, cannot confirm recovery");
                false
            }
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Failed to read operator confirmation");
                false
            }
        }
    }
}

/// How a recovery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryResult {
    /// A probe succeeded after the given zero-based backoff attempt
    Probed {
        /// Backoff attempt that preceded the successful probe
        attempt: u32,
    },
    /// Identity rotation produced a working route
    Rotated,
    /// The operator confirmed recovery
    OperatorConfirmed,
    /// Nothing worked, or a stop was requested while recovering
    Abandoned,
}

impl RecoveryResult {
    /// Whether dispatching may resume
    pub fn resumed(&self) -> bool {
        !matches!(self, Self::Abandoned)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Probed { .. } => "probe",
            Self::Rotated => "rotation",
            Self::OperatorConfirmed => "operator",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Global throttle recovery state for one run
pub struct ThrottleRecovery {
    policy: ThrottlePolicy,
    rotation: IdentityRotation,
    operator: Option<Arc<dyn OperatorGate>>,
    recoveries: u32,
    epoch: u64,
}

impl ThrottleRecovery {
    /// Create recovery state with the given ladder and escalation targets
    pub fn new(
        policy: ThrottlePolicy,
        rotation: IdentityRotation,
        operator: Option<Arc<dyn OperatorGate>>,
    ) -> Self {
        Self {
            policy,
            rotation,
            operator,
            recoveries: 0,
            epoch: 0,
        }
    }

    /// Current recovery epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Recoveries performed so far (successful or not)
    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    /// Run the full recovery ladder once
    pub async fn recover(
        &mut self,
        connector: &dyn SourceConnector,
        stop: Option<&SharedStop>,
    ) -> RecoveryResult {
        self.recoveries += 1;
        warn!(
            recovery = self.recoveries,
            connector = connector.name(),
            "Throttled by remote endpoint, pausing dispatch"
        );

        let result = self.climb_ladder(connector, stop).await;
        if result.resumed() {
            self.epoch += 1;
            info!(recovery = self.recoveries, via = result.label(), "Throttle cleared, resuming");
        } else {
            error!(recovery = self.recoveries, "Throttle recovery abandoned");
        }
        metrics::record_throttle_recovery(result.label());
        result
    }

    async fn climb_ladder(
        &self,
        connector: &dyn SourceConnector,
        stop: Option<&SharedStop>,
    ) -> RecoveryResult {
        for attempt in 0..self.policy.attempts {
            let delay = self.policy.backoff(attempt);
            info!(
                attempt = attempt + 1,
                attempts = self.policy.attempts,
                delay_secs = delay.as_secs_f64(),
                "Backing off before probing"
            );

            if !sleep_unless_stopped(delay, stop).await {
                return RecoveryResult::Abandoned;
            }

            if connector.probe().await {
                return RecoveryResult::Probed { attempt };
            }
            warn!(attempt = attempt + 1, "Probe still throttled");
        }

        if self.rotation.rotate().await {
            if connector.probe().await {
                return RecoveryResult::Rotated;
            }
            warn!("Probe failed after identity rotation");
        }

        if is_stopped(stop) {
            return RecoveryResult::Abandoned;
        }

        match &self.operator {
            Some(gate) => {
                let reason = format!("{} is still throttling requests", connector.name());
                let confirmed = match stop {
                    Some(stop) => tokio::select! {
                        confirmed = gate.wait_for_operator(&reason) => confirmed,
                        _ = stop.stopped() => false,
                    },
                    None => gate.wait_for_operator(&reason).await,
                };
                if confirmed {
                    RecoveryResult::OperatorConfirmed
                } else {
                    RecoveryResult::Abandoned
                }
            }
            None => RecoveryResult::Abandoned,
        }
    }
}

fn is_stopped(stop: Option<&SharedStop>) -> bool {
    stop.map(|s| s.is_stop_requested()).unwrap_or(false)
}

/// Sleep for `delay`; returns `false` if a stop was requested first
async fn sleep_unless_stopped(delay: std::time::Duration, stop: Option<&SharedStop>) -> bool {
    match stop {
        Some(stop) => tokio::select! {
            _ = tokio::time::sleep(delay) => !stop.is_stop_requested(),
            _ = stop.stopped() => false,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}
