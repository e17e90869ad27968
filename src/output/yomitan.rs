//! Yomitan dictionary writers
//!
//! A term row is the 8-element array Yomitan imports:
//! `[term, reading, definition_tags, rules, score, [definition], sequence, term_tags]`.
//! The definition is structured content: the translation in bold, then
//! the word-list flags, up to three examples and a sentence pair when present.

use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{
    persist, temp_file_for, write_atomically, DictionaryEntry, OutputError, OutputResult,
    ResultSink,
};

/// Examples rendered per entry
pub const MAX_RENDERED_EXAMPLES: usize = 3;

/// Entries per `term_bank_N.json`
pub const TERM_BANK_SIZE: usize = 10_000;

/// Yomitan dictionary format version written to `index.json`
pub const YOMITAN_FORMAT: u32 = 3;

/// Build one term row; `sequence` is 1-based
pub fn term_row(entry: &DictionaryEntry, sequence: usize) -> Value {
    let payload = &entry.payload;
    let mut content = vec![json!({
        "tag": "div",
        "content": [{
            "tag": "span",
            "style": { "fontWeight": "bold" },
            "content": payload.translation,
        }],
    })];

    if !entry.metadata.is_empty() {
        content.push(json!({
            "tag": "div",
            "style": { "fontSize": "0.85em" },
            "content": format!("Flags: {}", entry.metadata),
        }));
    }

    if !payload.examples.is_empty() {
        let items: Vec<Value> = payload
            .examples
            .iter()
            .take(MAX_RENDERED_EXAMPLES)
            .map(|example| json!({ "tag": "li", "content": example }))
            .collect();
        content.push(json!({ "tag": "ul", "content": items }));
    }

    if let Some(sentence) = &payload.sentence {
        content.push(json!({
            "tag": "div",
            "content": [
                { "tag": "span", "style": { "fontStyle": "italic" }, "content": sentence.source },
                { "tag": "br" },
                sentence.native,
            ],
        }));
    }

    json!([
        entry.key.as_str(),
        "",
        payload.attributes.join(" "),
        "",
        0,
        [{ "type": "structured-content", "content": content }],
        sequence,
        "",
    ])
}

fn term_rows(entries: &[DictionaryEntry]) -> Vec<Value> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| term_row(entry, i + 1))
        .collect()
}

/// Dictionary metadata for `index.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryInfo {
    pub title: String,
    pub revision: String,
    pub author: String,
    pub description: String,
    pub source_language: String,
    pub target_language: String,
}

impl DictionaryInfo {
    /// Default metadata for a language pair, revision stamped with today's date
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        let source_language = source_language.into();
        let target_language = target_language.into();
        Self {
            title: format!(
                "{}-{} dict-builder",
                source_language.to_uppercase(),
                target_language.to_uppercase()
            ),
            revision: chrono::Utc::now().format("%Y%m%d").to_string(),
            author: "dict-builder".to_string(),
            description: format!(
                "{} to {} dictionary built from online translation sources",
                source_language.to_uppercase(),
                target_language.to_uppercase()
            ),
            source_language,
            target_language,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    fn index_json(&self) -> Value {
        json!({
            "title": self.title,
            "revision": self.revision,
            "format": YOMITAN_FORMAT,
            "sequenced": true,
            "author": self.author,
            "description": self.description,
            "sourceLanguage": self.source_language,
            "targetLanguage": self.target_language,
        })
    }
}

/// Single term-bank JSON array
pub struct YomitanSink {
    path: PathBuf,
}

impl YomitanSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for YomitanSink {
    fn write(&mut self, entries: &[DictionaryEntry]) -> OutputResult<()> {
        let rows = term_rows(entries);
        write_atomically(&self.path, |w| {
            serde_json::to_writer_pretty(w, &rows)
                .map_err(|e| OutputError::SerializationError(e.to_string()))
        })?;
        info!(path = %self.path.display(), entries = rows.len(), "Yomitan term bank written");
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Importable Yomitan dictionary zip
pub struct YomitanArchiveSink {
    path: PathBuf,
    info: DictionaryInfo,
    bank_size: usize,
}

impl YomitanArchiveSink {
    pub fn new(path: impl Into<PathBuf>, info: DictionaryInfo) -> Self {
        Self {
            path: path.into(),
            info,
            bank_size: TERM_BANK_SIZE,
        }
    }

    /// Override entries per term bank (minimum 1)
    pub fn with_bank_size(mut self, bank_size: usize) -> Self {
        self.bank_size = bank_size.max(1);
        self
    }
}

fn archive_error(e: impl std::fmt::Display) -> OutputError {
    OutputError::ArchiveError(e.to_string())
}

impl ResultSink for YomitanArchiveSink {
    fn write(&mut self, entries: &[DictionaryEntry]) -> OutputResult<()> {
        let rows = term_rows(entries);
        let temp_file = temp_file_for(&self.path)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(temp_file);

        zip.start_file("index.json", options).map_err(archive_error)?;
        let index = serde_json::to_vec_pretty(&self.info.index_json())
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        zip.write_all(&index)
            .map_err(|e| OutputError::IoError(e.to_string()))?;

        let mut banks = 0;
        for (i, chunk) in rows.chunks(self.bank_size).enumerate() {
            let name = format!("term_bank_{}.json", i + 1);
            zip.start_file(name.as_str(), options).map_err(archive_error)?;
            let bank = serde_json::to_vec(chunk)
                .map_err(|e| OutputError::SerializationError(e.to_string()))?;
            zip.write_all(&bank)
                .map_err(|e| OutputError::IoError(e.to_string()))?;
            debug!(bank = %name, entries = chunk.len(), "Term bank added");
            banks += 1;
        }

        let temp_file = zip.finish().map_err(archive_error)?;
        persist(temp_file, &self.path)?;

        info!(
            path = %self.path.display(),
            entries = rows.len(),
            banks,
            title = %self.info.title,
            "Yomitan dictionary archive written"
        );
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
