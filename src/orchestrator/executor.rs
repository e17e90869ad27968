//! Batch orchestrator
//!
//! Pending words are split into fixed-size batches. Inside a batch, up to
//! `worker_count` fetches run concurrently on a [`JoinSet`]; each task hands
//! its [`Outcome`] back through its join handle and only this coordinating
//! loop mutates the [`ProgressState`]. A checkpoint is written after every
//! batch, before the next batch is dispatched.

use futures::FutureExt;
use indicatif::ProgressBar;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::OrchestratorConfig;
use super::outcome::{FailureReason, Outcome};
use super::progress::{ProgressTracker, RunProgress};
use super::rotation::IdentityRotation;
use super::throttle::{OperatorGate, ThrottleRecovery};
use super::OrchestratorError;
use crate::connector::SourceConnector;
use crate::metrics;
use crate::resume::{ProgressState, ProgressStore};
use crate::shutdown::SharedStop;
use crate::word::WorkItem;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every pending word was dispatched
    Completed,
    /// A stop was requested; the run ended at a batch boundary
    ShutdownRequested,
    /// Throttle recovery failed; remaining words stay pending
    ThrottleUnresolved,
}

impl StopReason {
    /// Stable label for output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::ShutdownRequested => "shutdown_requested",
            Self::ThrottleUnresolved => "throttle_unresolved",
        }
    }
}

/// Counts for one run plus the resulting totals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Words pending when the run started
    pub pending: usize,
    /// Batches checkpointed
    pub batches: usize,
    /// Outcomes recorded this run
    pub processed: usize,
    /// Successes recorded this run
    pub succeeded: usize,
    /// Failures recorded this run
    pub failed: usize,
    /// Throttle recoveries performed this run
    pub throttle_recoveries: u32,
    /// Processed words in the final state
    pub total_processed: usize,
    /// Succeeded words in the final state
    pub total_succeeded: usize,
    /// Problematic words in the final state
    pub total_problematic: usize,
}

impl RunSummary {
    /// Share of processed words that have a payload, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.total_succeeded as f64 / self.total_processed as f64 * 100.0
        }
    }
}

/// Result of [`BatchOrchestrator::run`]
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final progress state (already checkpointed)
    pub state: ProgressState,
    /// Run counts
    pub summary: RunSummary,
    /// Why the run ended
    pub stop_reason: StopReason,
}

impl RunReport {
    /// Whether every pending word was dispatched
    pub fn is_complete(&self) -> bool {
        self.stop_reason == StopReason::Completed
    }
}

enum BatchEnd {
    Resolved,
    Halted,
}

/// Coordinates batched, rate-limited, resumable fetching
pub struct BatchOrchestrator {
    connector: Arc<dyn SourceConnector>,
    config: OrchestratorConfig,
    store: Option<ProgressStore>,
    rotation: IdentityRotation,
    operator: Option<Arc<dyn OperatorGate>>,
    stop: Option<SharedStop>,
    tracker: ProgressTracker,
    progress_bar: Option<ProgressBar>,
}

impl BatchOrchestrator {
    /// Create an orchestrator with default configuration and no store
    pub fn new(connector: Arc<dyn SourceConnector>) -> Self {
        Self {
            connector,
            config: OrchestratorConfig::default(),
            store: None,
            rotation: IdentityRotation::Unavailable,
            operator: None,
            stop: None,
            tracker: ProgressTracker::default(),
            progress_bar: None,
        }
    }

    /// Set tunables
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist checkpoints to `store`
    pub fn with_store(mut self, store: ProgressStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable identity rotation during throttle recovery
    pub fn with_rotation(mut self, rotation: IdentityRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Escalate unresolved throttling to an operator
    pub fn with_operator_gate(mut self, gate: Arc<dyn OperatorGate>) -> Self {
        self.operator = Some(gate);
        self
    }

    /// Attach a shared stop signal
    pub fn with_stop(mut self, stop: SharedStop) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Customize progress log cadence
    pub fn with_progress_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Advance a progress bar as outcomes are recorded
    pub fn with_progress_bar(mut self, progress_bar: ProgressBar) -> Self {
        self.progress_bar = Some(progress_bar);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map(|s| s.is_stop_requested())
            .unwrap_or(false)
    }

    /// Words that `run` would dispatch, in dispatch order
    pub fn pending(&self, items: &[WorkItem], state: &ProgressState) -> Vec<WorkItem> {
        state.pending(items, self.config.retry_problematic)
    }

    /// Process every pending item, checkpointing after each batch
    ///
    /// Only a failed checkpoint write is an error; per-word failures are
    /// recorded in the state and never abort the run.
    pub async fn run(
        &self,
        items: &[WorkItem],
        prior: ProgressState,
    ) -> Result<RunReport, OrchestratorError> {
        let span = info_span!("run", connector = self.connector.name(), words = items.len());
        self.run_inner(items, prior).instrument(span).await
    }

    async fn run_inner(
        &self,
        items: &[WorkItem],
        mut state: ProgressState,
    ) -> Result<RunReport, OrchestratorError> {
        let pending = self.pending(items, &state);
        let batch_size = self.config.batch_size.max(1);
        let batch_count = pending.len().div_ceil(batch_size);

        info!(
            input_words = items.len(),
            already_processed = state.processed().len(),
            pending = pending.len(),
            batches = batch_count,
            batch_size,
            workers = self.config.worker_count(),
            "Starting run"
        );

        let mut summary = RunSummary {
            pending: pending.len(),
            ..RunSummary::default()
        };
        let mut recovery = ThrottleRecovery::new(
            self.config.throttle,
            self.rotation.clone(),
            self.operator.clone(),
        );
        let mut progress = self.tracker.start(pending.len() as u64);
        let mut stop_reason = StopReason::Completed;

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            if self.stop_requested() {
                info!(batch = index + 1, "Stop requested, ending run at batch boundary");
                stop_reason = StopReason::ShutdownRequested;
                break;
            }

            let label = format!("batch {}/{}", index + 1, batch_count);
            progress.set_phase(Some(label.clone()));
            if let Some(pb) = &self.progress_bar {
                pb.set_message(label);
            }

            let span = info_span!("batch", index = index + 1, size = batch.len());
            let end = self
                .run_batch(batch, &mut state, &mut recovery, &mut summary, &mut progress)
                .instrument(span)
                .await;

            self.checkpoint(&mut state)?;
            summary.batches += 1;

            if progress.should_emit_update() {
                info!("{}", progress.format_progress());
                progress.mark_emitted();
            }

            if let BatchEnd::Halted = end {
                stop_reason = if self.stop_requested() {
                    StopReason::ShutdownRequested
                } else {
                    StopReason::ThrottleUnresolved
                };
                break;
            }

            if index + 1 < batch_count && !self.inter_batch_pause().await {
                stop_reason = StopReason::ShutdownRequested;
                break;
            }
        }

        summary.throttle_recoveries = recovery.recoveries();
        summary.total_processed = state.processed().len();
        summary.total_succeeded = state.succeeded().len();
        summary.total_problematic = state.problematic().len();

        info!(
            reason = stop_reason.as_str(),
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            total_processed = summary.total_processed,
            total_succeeded = summary.total_succeeded,
            total_problematic = summary.total_problematic,
            success_rate = format!("{:.1}%", summary.success_rate()),
            "Run finished"
        );

        Ok(RunReport {
            state,
            summary,
            stop_reason,
        })
    }

    async fn run_batch(
        &self,
        batch: &[WorkItem],
        state: &mut ProgressState,
        recovery: &mut ThrottleRecovery,
        summary: &mut RunSummary,
        progress: &mut RunProgress,
    ) -> BatchEnd {
        let workers = self.config.worker_count();
        let timeout = self.config.fetch_timeout;
        let mut queue: VecDeque<WorkItem> = batch.iter().cloned().collect();
        let mut tasks: JoinSet<(WorkItem, u64, Outcome)> = JoinSet::new();
        let mut halted = false;

        loop {
            while !halted && tasks.len() < workers {
                let Some(item) = queue.pop_front() else {
                    break;
                };
                let connector = self.connector.clone();
                let epoch = recovery.epoch();
                tasks.spawn(async move {
                    let outcome = AssertUnwindSafe(connector.fetch(&item, timeout))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            error!(key = %item.key, "Connector panicked");
                            Outcome::Failure(FailureReason::TransportError)
                        });
                    (item, epoch, outcome)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (item, dispatched_at, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Fetch task failed to complete");
                    continue;
                }
            };

            if !outcome.is_throttled() {
                self.record(state, &item, outcome, summary, progress);
                continue;
            }

            if halted {
                debug!(key = %item.key, "Throttled after halt, leaving pending");
                continue;
            }

            if dispatched_at < recovery.epoch() {
                debug!(key = %item.key, "Throttled before the last recovery, re-queueing");
                queue.push_front(item);
                continue;
            }

            if recovery.recoveries() >= self.config.max_throttle_recoveries {
                warn!(
                    key = %item.key,
                    max_recoveries = self.config.max_throttle_recoveries,
                    "Throttle recovery budget exhausted, recording failure"
                );
                self.record(state, &item, outcome, summary, progress);
                continue;
            }

            let result = recovery.recover(self.connector.as_ref(), self.stop.as_ref()).await;
            if result.resumed() {
                queue.push_front(item);
            } else {
                warn!(
                    in_flight = tasks.len(),
                    undispatched = queue.len() + 1,
                    "Halting dispatch; unresolved words stay pending for the next run"
                );
                halted = true;
            }
        }

        if halted {
            BatchEnd::Halted
        } else {
            BatchEnd::Resolved
        }
    }

    fn record(
        &self,
        state: &mut ProgressState,
        item: &WorkItem,
        outcome: Outcome,
        summary: &mut RunSummary,
        progress: &mut RunProgress,
    ) {
        let label = outcome.label();
        metrics::record_outcome(self.connector.name(), label);

        let success = matches!(outcome, Outcome::Success(_));
        if success {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
            debug!(key = %item.key, reason = label, "Word failed");
        }
        summary.processed += 1;
        progress.update(1, u64::from(success));
        if let Some(pb) = &self.progress_bar {
            pb.inc(1);
        }

        state.record(&item.key, outcome);
    }

    fn checkpoint(&self, state: &mut ProgressState) -> Result<(), OrchestratorError> {
        state.mark_checkpoint();
        if let Some(store) = &self.store {
            store.save(state).map_err(|e| {
                error!(
                    error = %e,
                    path = %store.path().display(),
                    "Checkpoint failed, aborting run"
                );
                OrchestratorError::Checkpoint(e)
            })?;
        }
        metrics::record_checkpoint(state.processed().len());
        debug!(
            processed = state.processed().len(),
            succeeded = state.succeeded().len(),
            problematic = state.problematic().len(),
            "Checkpoint written"
        );
        Ok(())
    }

    /// Sleep between batches; `false` when a stop interrupts the pause
    async fn inter_batch_pause(&self) -> bool {
        let delay = self.config.inter_batch_delay;
        if delay.is_zero() {
            return !self.stop_requested();
        }
        match &self.stop {
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
}
