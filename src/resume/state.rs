//! Persisted progress state
//!
//! On disk this is a single JSON object:
//!
//! ```json
//! {
//!   "translations": {
//!     "casa": "집",
//!     "agua": { "translation": "물", "examples": ["agua fría"] }
//!   },
//!   "processed_words": ["agua", "casa", "xyz123"],
//!   "problematic_words": ["xyz123"],
//!   "results_count": 2,
//!   "schema_version": "2.0.0",
//!   "metadata": {
//!     "total_checkpoints": 1,
//!     "created_at": 1700000000000,
//!     "updated_at": 1700000000000
//!   }
//! }
//! ```
//!
//! Every field is optional on load, so progress files written by older
//! builds (which only had the first four fields, plus a separate `examples`
//! map) load cleanly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};

use crate::orchestrator::outcome::{Outcome, Payload};
use crate::word::{Key, WorkItem};

/// Current progress file schema version
pub const SCHEMA_VERSION: &str = "2.0.0";

/// Schema version assumed when the field is absent
pub const LEGACY_SCHEMA_VERSION: &str = "1.0.0";

fn legacy_schema_version() -> String {
    LEGACY_SCHEMA_VERSION.to_string()
}

/// Resumable record of {processed, succeeded, problematic} keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(default)]
    translations: BTreeMap<Key, Payload>,
    #[serde(default)]
    processed_words: BTreeSet<Key>,
    #[serde(default)]
    problematic_words: BTreeSet<Key>,
    #[serde(default)]
    results_count: usize,
    #[serde(default = "legacy_schema_version")]
    schema_version: String,
    #[serde(default)]
    metadata: StateMetadata,
    /// Example phrases kept beside the translations by older builds
    #[serde(default, skip_serializing)]
    examples: BTreeMap<Key, Vec<String>>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    /// Create an empty state
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            translations: BTreeMap::new(),
            processed_words: BTreeSet::new(),
            problematic_words: BTreeSet::new(),
            results_count: 0,
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: StateMetadata {
                created_at: Some(now),
                updated_at: Some(now),
                ..StateMetadata::default()
            },
            examples: BTreeMap::new(),
        }
    }

    /// Keys with a recorded terminal outcome
    pub fn processed(&self) -> &BTreeSet<Key> {
        &self.processed_words
    }

    /// Every payload ever recorded
    pub fn succeeded(&self) -> &BTreeMap<Key, Payload> {
        &self.translations
    }

    /// Keys whose most recent outcome was a failure
    pub fn problematic(&self) -> &BTreeSet<Key> {
        &self.problematic_words
    }

    /// Checkpoint bookkeeping
    pub fn metadata(&self) -> &StateMetadata {
        &self.metadata
    }

    /// Schema version this state was written with
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Whether a key has been processed
    pub fn is_processed(&self, key: &Key) -> bool {
        self.processed_words.contains(key)
    }

    /// Record one terminal outcome
    ///
    /// A success always wins: it is added to `succeeded` and clears the key
    /// from `problematic`. A failure marks the key problematic unless a
    /// payload is already on record, in which case the earlier success is
    /// kept.
    pub fn record(&mut self, key: &Key, outcome: Outcome) {
        self.processed_words.insert(key.clone());
        match outcome {
            Outcome::Success(payload) => {
                self.problematic_words.remove(key);
                self.translations.insert(key.clone(), payload);
            }
            Outcome::Failure(reason) => {
                if self.translations.contains_key(key) {
                    debug!(key = %key, %reason, "Keeping earlier payload despite failure");
                } else {
                    self.problematic_words.insert(key.clone());
                }
            }
        }
    }

    /// Select the work that still needs doing, in dispatch order
    ///
    /// Problematic keys present in `items` come first (in input order) when
    /// `retry_problematic` is set, followed by keys never processed.
    pub fn pending(&self, items: &[WorkItem], retry_problematic: bool) -> Vec<WorkItem> {
        let mut retries = Vec::new();
        let mut fresh = Vec::new();
        let mut seen = HashSet::new();

        for item in items {
            if !seen.insert(&item.key) {
                continue;
            }
            if self.problematic_words.contains(&item.key) {
                if retry_problematic {
                    retries.push(item.clone());
                }
            } else if !self.processed_words.contains(&item.key) {
                fresh.push(item.clone());
            }
        }

        if !retries.is_empty() {
            info!(retries = retries.len(), fresh = fresh.len(), "Retrying problematic words first");
        }
        retries.extend(fresh);
        retries
    }

    /// Bookkeeping performed right before a checkpoint write
    pub fn mark_checkpoint(&mut self) {
        self.results_count = self.translations.len();
        self.metadata.total_checkpoints += 1;
        self.metadata.updated_at = Some(chrono::Utc::now().timestamp_millis());
        self.schema_version = SCHEMA_VERSION.to_string();
    }

    /// Check the cross-set invariants
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();

        for key in self.translations.keys() {
            if !self.processed_words.contains(key) {
                violations.push(format!("'{key}' succeeded but is not marked processed"));
            }
            if self.problematic_words.contains(key) {
                violations.push(format!("'{key}' is both succeeded and problematic"));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Bring a freshly loaded state up to the current schema
    ///
    /// Merges the legacy `examples` map into payloads and repairs
    /// invariant violations (hand-edited files), logging what changed.
    pub(crate) fn upgrade(&mut self) {
        if !self.examples.is_empty() {
            let legacy = std::mem::take(&mut self.examples);
            let mut merged = 0usize;
            for (key, examples) in legacy {
                if let Some(payload) = self.translations.get_mut(&key) {
                    if payload.examples.is_empty() && !examples.is_empty() {
                        payload.examples = examples;
                        merged += 1;
                    }
                }
            }
            info!(merged, "Merged legacy example phrases into payloads");
        }

        let succeeded: Vec<Key> = self.translations.keys().cloned().collect();
        for key in succeeded {
            if self.processed_words.insert(key.clone()) {
                warn!(key = %key, "Repaired: succeeded key was not marked processed");
            }
            if self.problematic_words.remove(&key) {
                warn!(key = %key, "Repaired: succeeded key was also problematic");
            }
        }

        if self.schema_version != SCHEMA_VERSION {
            info!(
                old_version = %self.schema_version,
                new_version = SCHEMA_VERSION,
                "Migrated progress state schema"
            );
            self.schema_version = SCHEMA_VERSION.to_string();
        }
    }

    #[cfg(test)]
    pub(crate) fn set_schema_version(&mut self, version: &str) {
        self.schema_version = version.to_string();
    }
}

/// Checkpoint bookkeeping stored with the state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateMetadata {
    #[serde(default)]
    total_checkpoints: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<i64>,
}

impl StateMetadata {
    /// Checkpoints written over the lifetime of this file
    pub fn total_checkpoints(&self) -> u64 {
        self.total_checkpoints
    }

    /// Creation time (Unix milliseconds), absent for legacy files
    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    /// Last checkpoint time (Unix milliseconds)
    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }
}
