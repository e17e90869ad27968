//! # Dict Builder Library
//!
//! Builds bilingual dictionaries by sending every word of a word list to an
//! online translation source, then writing the results as an importable
//! Yomitan dictionary or CSV. Runs over tens of thousands of words survive
//! crashes, restarts and source-side throttling without losing work.
//!
//! ## Features
//!
//! - **Resumable**: progress is checkpointed after every batch and reloaded on start
//! - **Rate Limited**: one shared limiter enforces a minimum spacing between requests
//! - **Throttle Recovery**: backoff and probe, identity rotation, then operator confirmation
//! - **Failure Isolation**: one bad word never affects another; failures are retried first next run
//! - **Multiple Sources**: Google Translate, or MyMemory with Glosbe example phrases
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use dict_builder::connector::{create_connector, ConnectorKind, ExtractPolicy, LanguagePair};
//! use dict_builder::orchestrator::{BatchOrchestrator, RateLimiter};
//! use dict_builder::output::{collect_entries, ResultSink, YomitanSink};
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
//!
//! let entries = collect_entries(report.state.succeeded(), &items);
//! YomitanSink::new("term_bank_1.json").write(&entries)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`word`] - Word list parsing and the [`Key`]/[`WorkItem`] types
//! - [`connector`] - Translation sources behind the
//!   [`SourceConnector`](connector::SourceConnector) trait
//! - [`orchestrator`] - Batching, rate limiting, throttle recovery and checkpointing
//! - [`resume`] - The persisted progress state and its atomic store
//! - [`output`] - Dictionary writers and the problematic-words report
//! - [`metrics`] - Prometheus metrics

#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Translation source connectors
pub mod connector;

/// Metrics collection and Prometheus export
pub mod metrics;

/// Batch orchestration engine
pub mod orchestrator;

/// Dictionary output writers
pub mod output;

/// Resumable progress state
pub mod resume;

/// Graceful shutdown signalling
pub mod shutdown;

/// Words and word lists
pub mod word;

// Re-export commonly used types
pub use connector::{ConnectorKind, LanguagePair, SourceConnector};
pub use orchestrator::{BatchOrchestrator, FailureReason, Outcome, Payload};
pub use resume::{ProgressState, ProgressStore};
pub use word::{Key, WorkItem};
