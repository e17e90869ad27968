//! Word list parsing and the unit-of-work types
//!
//! A word list is a UTF-8 text file with one entry per line:
//!
//! ```text
//! # comment lines are skipped
//! casa|n
//! agua|n
//! xyz123
//! ```
//!
//! Everything after the first `|` is connector metadata (e.g. a flags
//! string). It is opaque to the orchestrator and carried through to the
//! final artifact unchanged.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Marker that starts a comment line
pub const COMMENT_MARKER: char = '#';

/// Separator between key and metadata
pub const METADATA_SEPARATOR: char = '|';

/// Lookup key for one unit of work
///
/// Keys are trimmed on construction. Case and diacritics are significant:
/// `Casa`, `casa` and `cása` are three different keys.
///
/// # Examples
///
/// ```
/// use dict_builder::word::Key;
///
/// let key = Key::new("  casa ");
/// assert_eq!(key.as_str(), "casa");
/// assert_ne!(Key::new("Casa"), key);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Create a key from raw input, trimming surrounding whitespace
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// Borrow the key text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty after trimming
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A key plus its opaque metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Lookup key
    pub key: Key,
    /// Connector-specific metadata (flags), empty when absent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata: String,
}

impl WorkItem {
    /// Create a work item without metadata
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            metadata: String::new(),
        }
    }

    /// Create a work item with metadata
    pub fn with_metadata(key: impl Into<Key>, metadata: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            metadata: metadata.into().trim().to_string(),
        }
    }

    /// Parse one word-list line
    ///
    /// Returns `None` for blank lines, comment lines, and lines whose key is
    /// empty (e.g. `|flags`).
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            return None;
        }

        let item = match line.split_once(METADATA_SEPARATOR) {
            Some((key, metadata)) => Self::with_metadata(key, metadata),
            None => Self::new(line),
        };

        if item.key.is_empty() {
            return None;
        }
        Some(item)
    }
}

/// Word list errors
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The word list file does not exist
    #[error("word list not found: {0}")]
    NotFound(String),

    /// The word list could not be read
    #[error("failed to read word list {path}: {message}")]
    ReadError {
        /// Path of the word list
        path: String,
        /// Underlying error message
        message: String,
    },
}

/// Parse word-list text into work items
///
/// Order is preserved. Duplicate keys keep their first occurrence (and its
/// metadata).
pub fn parse_word_list(contents: &str) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    let mut duplicates = 0usize;

    for item in contents.lines().filter_map(WorkItem::parse_line) {
        if seen.insert(item.key.clone()) {
            items.push(item);
        } else {
            duplicates += 1;
        }
    }

    if duplicates > 0 {
        debug!(duplicates, "Dropped duplicate keys from word list");
    }
    items
}

/// Load a word list from disk
pub fn load_word_list(path: &Path) -> Result<Vec<WorkItem>, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound(path.display().to_string()));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| InputError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let items = parse_word_list(&contents);
    info!(
        path = %path.display(),
        unique_words = items.len(),
        "Loaded word list"
    );
    Ok(items)
}
