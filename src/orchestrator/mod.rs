//! Resumable batch orchestration
//!
//! This module is the engine of the crate: it drives a connector over a
//! word list in checkpointed batches.
//!
//! # Overview
//!
//! 1. **Selection**: [`ProgressState::pending`](crate::resume::ProgressState::pending)
//!    skips processed words and puts problematic ones first
//! 2. **Execution**: [`BatchOrchestrator`] runs each batch on a bounded worker pool
//! 3. **Rate limiting**: connectors share one [`RateLimiter`]
//! 4. **Throttling**: [`ThrottleRecovery`] backs off, probes, rotates identity
//!    ([`IdentityRotation`]) and finally asks an [`OperatorGate`]
//! 5. **Checkpointing**: the whole state is saved after every batch
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use dict_builder::connector::{create_connector, ConnectorKind, ExtractPolicy, LanguagePair};
//! use dict_builder::orchestrator::{BatchOrchestrator, RateLimiter};
//! use dict_builder::resume::ProgressStore;
//! use dict_builder::word::load_word_list;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let items = load_word_list("words.txt".as_ref())?;
//! let store = ProgressStore::new("progress.json");
//! let connector = create_connector(
//!     ConnectorKind::Google,
//!     LanguagePair::new("es", "ko")?,
//!     Arc::new(RateLimiter::per_second(10)),
//!     ExtractPolicy::default(),
//!     3,
//! );
//!
//! let report = BatchOrchestrator::new(connector)
//!     .with_store(store.clone())
//!     .run(&items, store.load()?)
//!     .await?;
//! println!("{} words translated", report.state.succeeded().len());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Per-word failures are data, not errors: they land in the progress state
//! as problematic words. The only run-level error is a failed checkpoint
//! write ([`OrchestratorError::Checkpoint`]).

pub mod config;
pub mod executor;
pub mod outcome;
pub mod progress;
pub mod rate_limit;
pub mod rotation;
pub mod throttle;

pub use config::{OrchestratorConfig, ThrottlePolicy};
pub use executor::{BatchOrchestrator, RunReport, RunSummary, StopReason};
pub use outcome::{FailureReason, Outcome, Payload, SentencePair};
pub use progress::{ProgressTracker, RunProgress};
pub use rate_limit::RateLimiter;
pub use rotation::{CommandRotator, IdentityRotation, IdentityRotator};
pub use throttle::{OperatorGate, RecoveryResult, StdinOperatorGate, ThrottleRecovery};

use crate::resume::ResumeError;

/// Run-level orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A checkpoint could not be persisted; continuing would lose resumability
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] ResumeError),
}
