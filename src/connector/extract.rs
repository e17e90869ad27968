//! Field extraction from raw source responses
//!
//! Every field is extracted independently into a `Result`. The
//! [`ExtractPolicy`] then decides whether a missing optional field sinks the
//! whole word (`require_all_fields`) or is simply left empty.

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

use crate::orchestrator::outcome::{FailureReason, Outcome, Payload, SentencePair};
use crate::word::Key;

/// Example phrases kept per word
pub const MAX_EXAMPLES: usize = 5;

/// Why one field could not be extracted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// The response does not contain the field
    #[error("field '{0}' is missing")]
    Missing(&'static str),

    /// The translation is shorter than the configured minimum
    #[error("translation '{value}' is shorter than {min} characters")]
    TooShort {
        /// Extracted translation
        value: String,
        /// Configured minimum length
        min: usize,
    },

    /// The field is present but has the wrong shape
    #[error("field '{field}' is malformed: {detail}")]
    Malformed {
        /// Field name
        field: &'static str,
        /// What was wrong
        detail: String,
    },

    /// The request backing this field failed
    #[error("field '{field}' unavailable: {reason}")]
    Unavailable {
        /// Field name
        field: &'static str,
        /// Underlying failure
        reason: String,
    },
}

/// Per-field extraction results for one word
#[derive(Debug, Clone)]
pub struct Fields {
    /// Mandatory translation
    pub translation: Result<String, ExtractionError>,
    /// Example phrases
    pub examples: Result<Vec<String>, ExtractionError>,
    /// Audio reference
    pub audio: Result<Option<String>, ExtractionError>,
    /// Example sentence pair
    pub sentence: Result<Option<SentencePair>, ExtractionError>,
    /// Grammatical attributes
    pub attributes: Result<Vec<String>, ExtractionError>,
}

impl Fields {
    /// Only a translation; every optional field is empty
    pub fn translation(translation: Result<String, ExtractionError>) -> Self {
        Self {
            translation,
            examples: Ok(Vec::new()),
            audio: Ok(None),
            sentence: Ok(None),
            attributes: Ok(Vec::new()),
        }
    }

    /// Replace the examples result
    pub fn with_examples(mut self, examples: Result<Vec<String>, ExtractionError>) -> Self {
        self.examples = examples;
        self
    }
}

/// How per-field results become an [`Outcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractPolicy {
    /// Treat any optional-field error as `NoData` for the whole word
    pub require_all_fields: bool,
    /// Shortest acceptable translation, in characters
    pub min_translation_chars: usize,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self {
            require_all_fields: false,
            min_translation_chars: 1,
        }
    }
}

impl ExtractPolicy {
    /// Combine the field results for `key`
    pub fn assemble(&self, key: &Key, fields: Fields) -> Outcome {
        let translation = match fields.translation {
            Ok(t) if t.chars().count() >= self.min_translation_chars.max(1) => t,
            Ok(t) => {
                let err = ExtractionError::TooShort {
                    value: t,
                    min: self.min_translation_chars,
                };
                debug!(key = %key, error = %err, "No usable translation");
                return Outcome::Failure(FailureReason::NoData);
            }
            Err(err) => {
                debug!(key = %key, error = %err, "No usable translation");
                return Outcome::Failure(FailureReason::NoData);
            }
        };

        let mut payload = Payload::text(translation);
        let mut missing = Vec::new();

        match fields.examples {
            Ok(examples) => payload.examples = examples,
            Err(e) => missing.push(e),
        }
        match fields.audio {
            Ok(audio) => payload.audio = audio,
            Err(e) => missing.push(e),
        }
        match fields.sentence {
            Ok(sentence) => payload.sentence = sentence,
            Err(e) => missing.push(e),
        }
        match fields.attributes {
            Ok(attributes) => payload.attributes = attributes,
            Err(e) => missing.push(e),
        }

        for err in &missing {
            debug!(key = %key, error = %err, "Optional field left empty");
        }
        if self.require_all_fields && !missing.is_empty() {
            return Outcome::Failure(FailureReason::NoData);
        }
        Outcome::Success(payload)
    }
}

/// First translated segment of a `translate_a/single` response
///
/// The response is a nested array: `[[["집","casa",null,null,10]],null,"es",...]`.
pub fn google_translation(data: &Value) -> Result<String, ExtractionError> {
    let segments = data
        .get(0)
        .and_then(Value::as_array)
        .ok_or(ExtractionError::Missing("translation"))?;
    let first = segments
        .first()
        .and_then(|segment| segment.get(0))
        .ok_or(ExtractionError::Missing("translation"))?;
    let text = first.as_str().ok_or_else(|| ExtractionError::Malformed {
        field: "translation",
        detail: format!("expected string, got {first}"),
    })?;
    Ok(text.trim().to_string())
}

/// Best translation from a MyMemory `get` response
///
/// Matches written in the target language's script win over the rest;
/// within a group the highest `(match, quality)` wins, earliest first on ties.
pub fn mymemory_translation(data: &Value, target_lang: &str) -> Result<String, ExtractionError> {
    let matches = data
        .get("matches")
        .and_then(Value::as_array)
        .ok_or(ExtractionError::Missing("matches"))?;

    let candidates: Vec<(&str, f64, f64)> = matches
        .iter()
        .filter_map(|m| {
            let text = m.get("translation")?.as_str()?.trim();
            if text.is_empty() {
                return None;
            }
            Some((text, score(m.get("match")), score(m.get("quality"))))
        })
        .collect();

    let in_script: Vec<_> = candidates
        .iter()
        .filter(|(text, _, _)| in_target_script(target_lang, text))
        .copied()
        .collect();
    let pool = if in_script.is_empty() { candidates } else { in_script };

    pool.into_iter()
        .reduce(|best, next| {
            let ordering = (next.1, next.2)
                .partial_cmp(&(best.1, best.2))
                .unwrap_or(Ordering::Equal);
            if ordering == Ordering::Greater {
                next
            } else {
                best
            }
        })
        .map(|(text, _, _)| text.to_string())
        .ok_or(ExtractionError::Missing("translation"))
}

/// MyMemory reports scores as numbers or numeric strings
fn score(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Source-language phrases from a Glosbe `similarPhrasesMany` response
///
/// Skips reverse-direction phrases, the word itself and duplicates; keeps
/// at most `limit`.
pub fn similar_phrases(
    data: &Value,
    key: &Key,
    limit: usize,
) -> Result<Vec<String>, ExtractionError> {
    let phrases = data
        .get("phrases")
        .and_then(Value::as_array)
        .ok_or(ExtractionError::Missing("phrases"))?;

    let mut seen = HashSet::new();
    Ok(phrases
        .iter()
        .filter(|p| !p.get("reverse").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|p| p.get("phrase").and_then(Value::as_str))
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != key.as_str())
        .filter(|p| seen.insert(p.to_string()))
        .take(limit)
        .map(str::to_string)
        .collect())
}

/// Whether `text` contains characters of the script `lang` is written in
///
/// Languages without a known script accept any text.
pub fn in_target_script(lang: &str, text: &str) -> bool {
    let in_ranges = |ranges: &[(char, char)]| {
        text.chars()
            .any(|c| ranges.iter().any(|&(lo, hi)| (lo..=hi).contains(&c)))
    };
    match lang {
        "ko" => in_ranges(&[
            ('\u{AC00}', '\u{D7AF}'),
            ('\u{1100}', '\u{11FF}'),
            ('\u{3130}', '\u{318F}'),
        ]),
        "ja" => in_ranges(&[('\u{3040}', '\u{30FF}'), ('\u{4E00}', '\u{9FFF}')]),
        "zh" => in_ranges(&[('\u{4E00}', '\u{9FFF}')]),
        "ru" | "uk" | "bg" | "sr" => in_ranges(&[('\u{0400}', '\u{04FF}')]),
        "el" => in_ranges(&[('\u{0370}', '\u{03FF}')]),
        "ar" | "fa" => in_ranges(&[('\u{0600}', '\u{06FF}')]),
        "he" => in_ranges(&[('\u{0590}', '\u{05FF}')]),
        "th" => in_ranges(&[('\u{0E00}', '\u{0E7F}')]),
        "hi" => in_ranges(&[('\u{0900}', '\u{097F}')]),
        _ => true,
    }
}

/// Every field of a Glosbe word page (`glosbe.com/{sl}/{tl}/{word}`)
///
/// - translation: each `li[data-element=translation]` heading, comma-joined
/// - attributes: the grammar tags in the page header (may be empty)
/// - audio: `{audio_base}/fb_aud/{data-file}` of the pronunciation button
///   for `source_lang`; missing when the page has none
/// - sentence: the first two paragraphs of the first translation's example
pub fn glosbe_page(html: &str, source_lang: &str, audio_base: &str) -> Fields {
    let document = Html::parse_document(html);

    Fields {
        translation: page_translation(&document),
        examples: Ok(Vec::new()),
        audio: page_audio(&document, source_lang, audio_base),
        sentence: page_sentence(&document),
        attributes: page_attributes(&document),
    }
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::Malformed {
        field: "selector",
        detail: format!("{css}: {e}"),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn page_translation(document: &Html) -> Result<String, ExtractionError> {
    let phrase = selector(r#"li[data-element="translation"] h3.translation__item__pharse"#)?;
    let mut seen = HashSet::new();
    let translations: Vec<String> = document
        .select(&phrase)
        .map(element_text)
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect();
    if translations.is_empty() {
        return Err(ExtractionError::Missing("translation"));
    }
    Ok(translations.join(", "))
}

fn page_attributes(document: &Html) -> Result<Vec<String>, ExtractionError> {
    let tag = selector(
        "span.text-xxs.text-gray-500.inline-block span.inline-block.dir-aware-pr-1",
    )?;
    Ok(document
        .select(&tag)
        .map(element_text)
        .map(|t| t.trim_end_matches(',').trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

fn page_audio(
    document: &Html,
    source_lang: &str,
    audio_base: &str,
) -> Result<Option<String>, ExtractionError> {
    let button = selector(&format!(r#"button.glosbe-audio[data-lang="{source_lang}"]"#))?;
    document
        .select(&button)
        .filter_map(|b| b.value().attr("data-file"))
        .map(str::trim)
        .find(|file| !file.is_empty())
        .map(|file| Some(format!("{}/fb_aud/{file}", audio_base.trim_end_matches('/'))))
        .ok_or(ExtractionError::Missing("audio"))
}

fn page_sentence(document: &Html) -> Result<Option<SentencePair>, ExtractionError> {
    let first = selector(r#"li[data-element="translation"]"#)?;
    let paragraphs = selector("div.translation__example p")?;

    let example: Vec<String> = document
        .select(&first)
        .next()
        .map(|li| li.select(&paragraphs).map(element_text).collect())
        .unwrap_or_default();
    match example.as_slice() {
        [source, native, ..] if !source.is_empty() && !native.is_empty() => {
            Ok(Some(SentencePair {
                source: source.clone(),
                native: native.clone(),
            }))
        }
        _ => Err(ExtractionError::Missing("sentence")),
    }
}
