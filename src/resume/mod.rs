//! Resumable progress tracking
//!
//! Provides the persisted [`ProgressState`] and its atomic, lock-guarded
//! [`ProgressStore`].

pub mod state;
pub mod store;

pub use state::{ProgressState, StateMetadata, SCHEMA_VERSION};
pub use store::{ProgressStore, ResumeError, MAX_STATE_FILE_SIZE};
