//! Per-key outcome model
//!
//! Connectors report exactly one [`Outcome`] per dispatched work item. The
//! orchestrator classifies it into the progress state; connectors never
//! touch that state themselves.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Example sentence pair (source language, native language)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    /// Sentence in the word-list language
    pub source: String,
    /// Sentence in the operator's native language
    pub native: String,
}

/// Data produced for one successful key
///
/// Only `translation` is mandatory. A payload with nothing but a
/// translation is persisted as a bare JSON string, which is also how older
/// progress files store it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "PayloadRepr", into = "PayloadRepr")]
pub struct Payload {
    /// Translation text (comma-joined when several were found)
    pub translation: String,
    /// Example phrases in the source language
    pub examples: Vec<String>,
    /// Audio file reference (URL or file name)
    pub audio: Option<String>,
    /// Example sentence pair
    pub sentence: Option<SentencePair>,
    /// Grammatical attributes (part of speech, gender, ...)
    pub attributes: Vec<String>,
}

impl Payload {
    /// Payload holding only a translation
    pub fn text(translation: impl Into<String>) -> Self {
        Self {
            translation: translation.into(),
            ..Self::default()
        }
    }

    /// Attach example phrases
    pub fn with_examples(mut self, examples: Vec<String>) -> Self {
        self.examples = examples;
        self
    }

    /// Whether only the translation is populated
    pub fn is_text_only(&self) -> bool {
        self.examples.is_empty()
            && self.audio.is_none()
            && self.sentence.is_none()
            && self.attributes.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PayloadRepr {
    Text(String),
    Record(PayloadRecord),
}

#[derive(Serialize, Deserialize)]
struct PayloadRecord {
    translation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sentence: Option<SentencePair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<String>,
}

impl From<PayloadRepr> for Payload {
    fn from(repr: PayloadRepr) -> Self {
        match repr {
            PayloadRepr::Text(translation) => Payload::text(translation),
            PayloadRepr::Record(r) => Payload {
                translation: r.translation,
                examples: r.examples,
                audio: r.audio,
                sentence: r.sentence,
                attributes: r.attributes,
            },
        }
    }
}

impl From<Payload> for PayloadRepr {
    fn from(payload: Payload) -> Self {
        if payload.is_text_only() {
            return PayloadRepr::Text(payload.translation);
        }
        PayloadRepr::Record(PayloadRecord {
            translation: payload.translation,
            examples: payload.examples,
            audio: payload.audio,
            sentence: payload.sentence,
            attributes: payload.attributes,
        })
    }
}

/// Why a key did not produce a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The source answered but had nothing usable
    NoData,
    /// The source signalled that request volume must drop
    Throttled,
    /// Network or decoding failure after connector-local retries
    TransportError,
    /// The source produced a structurally malformed record
    Invalid,
}

impl FailureReason {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::Throttled => "throttled",
            Self::TransportError => "transport_error",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of processing one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The connector produced a payload
    Success(Payload),
    /// The connector failed for the given reason
    Failure(FailureReason),
}

impl Outcome {
    /// Shorthand for `Outcome::Success(Payload::text(..))`
    pub fn text(translation: impl Into<String>) -> Self {
        Self::Success(Payload::text(translation))
    }

    /// Whether this is a throttling signal
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Failure(FailureReason::Throttled))
    }

    /// Label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failure(reason) => reason.as_str(),
        }
    }
}
