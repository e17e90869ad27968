//! CSV output writer
//!
//! One row per word, header
//! `word,translation,examples,audio,sentence_target,sentence_native,flags`.
//! Examples are joined with `"; "`.

use csv::Writer;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{persist, temp_file_for, DictionaryEntry, OutputError, OutputResult, ResultSink};

/// Separator between examples inside one cell
pub const EXAMPLE_SEPARATOR: &str = "; ";

/// CSV record for one dictionary entry
#[derive(Debug, Serialize)]
struct EntryRecord<'a> {
    word: &'a str,
    translation: &'a str,
    examples: String,
    audio: &'a str,
    sentence_target: &'a str,
    sentence_native: &'a str,
    flags: &'a str,
}

impl<'a> From<&'a DictionaryEntry> for EntryRecord<'a> {
    fn from(entry: &'a DictionaryEntry) -> Self {
        let payload = &entry.payload;
        let (sentence_target, sentence_native) = payload
            .sentence
            .as_ref()
            .map(|s| (s.source.as_str(), s.native.as_str()))
            .unwrap_or(("", ""));
        Self {
            word: entry.key.as_str(),
            translation: &payload.translation,
            examples: payload.examples.join(EXAMPLE_SEPARATOR),
            audio: payload.audio.as_deref().unwrap_or(""),
            sentence_target,
            sentence_native,
            flags: &entry.metadata,
        }
    }
}

/// CSV sink
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for CsvSink {
    fn write(&mut self, entries: &[DictionaryEntry]) -> OutputResult<()> {
        let temp_file = temp_file_for(&self.path)?;
        let mut writer = Writer::from_writer(temp_file);

        // An empty result set still gets a header row
        if entries.is_empty() {
            writer
                .write_record([
                    "word",
                    "translation",
                    "examples",
                    "audio",
                    "sentence_target",
                    "sentence_native",
                    "flags",
                ])
                .map_err(|e| OutputError::CsvError(e.to_string()))?;
        }

        for entry in entries {
            writer
                .serialize(EntryRecord::from(entry))
                .map_err(|e| OutputError::CsvError(e.to_string()))?;
        }

        let temp_file = writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to flush CSV: {e}")))?;
        persist(temp_file, &self.path)?;

        info!(path = %self.path.display(), entries = entries.len(), "CSV written");
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
