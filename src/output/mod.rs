//! Result sinks
//!
//! Sinks receive the full accumulated result set once, at the end of a run
//! (or from `export`). Incremental durability is the progress store's job,
//! so every sink writes its artifact in one atomic step.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::orchestrator::outcome::Payload;
use crate::word::{Key, WorkItem};

pub mod csv;
pub mod report;
pub mod yomitan;

pub use self::csv::CsvSink;
pub use report::write_problematic_report;
pub use yomitan::{DictionaryInfo, YomitanArchiveSink, YomitanSink};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Zip archive error
    #[error("archive error: {0}")]
    ArchiveError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One word ready for the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    /// Headword
    pub key: Key,
    /// Data gathered for the word
    pub payload: Payload,
    /// Metadata carried through from the word list
    pub metadata: String,
}

/// Join results with word-list metadata
///
/// Words follow word-list order; results for words no longer in the list
/// (from earlier runs over a different list) follow in key order with empty
/// metadata.
pub fn collect_entries(
    succeeded: &BTreeMap<Key, Payload>,
    items: &[WorkItem],
) -> Vec<DictionaryEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(succeeded.len());

    for item in items {
        if let Some(payload) = succeeded.get(&item.key) {
            if seen.insert(&item.key) {
                entries.push(DictionaryEntry {
                    key: item.key.clone(),
                    payload: payload.clone(),
                    metadata: item.metadata.clone(),
                });
            }
        }
    }

    for (key, payload) in succeeded {
        if !seen.contains(key) {
            entries.push(DictionaryEntry {
                key: key.clone(),
                payload: payload.clone(),
                metadata: String::new(),
            });
        }
    }

    entries
}

/// Consumer of the final result set
pub trait ResultSink {
    /// Write every entry as one artifact
    fn write(&mut self, entries: &[DictionaryEntry]) -> OutputResult<()>;

    /// Where the artifact goes
    fn path(&self) -> &Path;
}

/// Artifact formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ArtifactFormat {
    /// Single Yomitan term bank JSON array
    Yomitan,
    /// Importable Yomitan dictionary zip (index.json + term banks)
    YomitanZip,
    /// Flat CSV
    Csv,
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yomitan => "yomitan",
            Self::YomitanZip => "yomitan-zip",
            Self::Csv => "csv",
        })
    }
}

/// Build the sink for `format`
pub fn create_sink(
    format: ArtifactFormat,
    path: impl Into<PathBuf>,
    info: DictionaryInfo,
) -> Box<dyn ResultSink> {
    let path = path.into();
    match format {
        ArtifactFormat::Yomitan => Box::new(YomitanSink::new(path)),
        ArtifactFormat::YomitanZip => Box::new(YomitanArchiveSink::new(path, info)),
        ArtifactFormat::Csv => Box::new(CsvSink::new(path)),
    }
}

/// Create a temp file next to `path`, creating the directory if needed
pub(crate) fn temp_file_for(path: &Path) -> OutputResult<tempfile::NamedTempFile> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| OutputError::IoError(e.to_string()))?;
    tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))
}

/// Sync a finished temp file and rename it over `path`
pub(crate) fn persist(temp_file: tempfile::NamedTempFile, path: &Path) -> OutputResult<()> {
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist temp file: {e}")))?;
    Ok(())
}

/// Write a file atomically through a buffered writer
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> OutputResult<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> OutputResult<()>,
{
    let mut temp_file = temp_file_for(path)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
    }
    persist(temp_file, path)
}
