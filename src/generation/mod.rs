// Retrieval-augmented generators (quiz, notes, chat) and the helpers they share:
// batching, placeholder-content detection and lenient parsing of model JSON.

pub mod chat;
pub mod notes;
pub mod quiz;

#[cfg(test)]
mod tests;
#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use crate::{RagError, Result};

pub use chat::{ChatEngine, ChatRequest, ChatResponse, ContextSource};
pub use notes::{Notes, NotesGenerator, NotesParams};
pub use quiz::{Difficulty, Quiz, QuizDifficulty, QuizGenerator, QuizParams, QuizQuestion};

/// Separator placed between chunks that share one prompt
pub const SECTION_SEPARATOR: &str = "\n\n--- SECTION ---\n\n";

/// Phrases that only occur in placeholder text substituted for a missing
/// video transcript. Matched case-insensitively.
pub const FALLBACK_MARKERS: &[&str] = &[
    "does not have an available transcript",
    "transcript is not available",
    "fallback when video transcripts are not available",
    "educational video analysis - youtube video id",
    "no transcript available",
    "fallback content",
    "general educational content",
];

/// Heading used by metadata-only video descriptions
pub const METADATA_MARKER: &str = "VIDEO CONTENT ANALYSIS";

/// Closing line of a metadata-only video description. Text counts as
/// metadata-derived only when it carries both this and [`METADATA_MARKER`].
pub const METADATA_NOTE_MARKER: &str = "Note: This content is derived from video metadata";

/// A single prompt-in, text-out call to an external language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// What the retrieved text actually is, which decides the prompt template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Real source material (document text or a transcript)
    Transcript,
    /// A description built from video metadata, not the spoken content
    Metadata,
    /// Placeholder text; only the topic is known
    Fallback,
}

impl ContentKind {
    #[inline]
    pub fn is_fallback(self) -> bool {
        self == Self::Fallback
    }

    /// The weaker of two kinds: placeholder beats metadata beats real content.
    /// Folds per-batch kinds into the kind reported for a whole request.
    #[inline]
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Fallback, _) | (_, Self::Fallback) => Self::Fallback,
            (Self::Metadata, _) | (_, Self::Metadata) => Self::Metadata,
            _ => Self::Transcript,
        }
    }
}

#[inline]
pub fn detect_content_kind<S: AsRef<str>>(chunks: &[S]) -> ContentKind {
    let is_fallback = chunks.iter().any(|chunk| {
        let lower = chunk.as_ref().to_lowercase();
        FALLBACK_MARKERS.iter().any(|marker| lower.contains(marker))
    });
    if is_fallback {
        debug!("Detected placeholder content, switching to general-knowledge prompts");
        return ContentKind::Fallback;
    }

    let has_heading = chunks.iter().any(|chunk| chunk.as_ref().contains(METADATA_MARKER));
    let has_note = chunks
        .iter()
        .any(|chunk| chunk.as_ref().contains(METADATA_NOTE_MARKER));
    if has_heading && has_note {
        debug!("Detected metadata-derived content");
        return ContentKind::Metadata;
    }

    ContentKind::Transcript
}

/// Kind of a single batch within a request whose chunks as a whole are
/// `request_kind`. Metadata text can be split so that its heading and note
/// land in different batches, so a batch carrying either one counts as
/// metadata when the request does.
#[inline]
pub fn batch_content_kind(batch: &str, request_kind: ContentKind) -> ContentKind {
    match detect_content_kind(&[batch]) {
        ContentKind::Transcript
            if request_kind == ContentKind::Metadata
                && (batch.contains(METADATA_MARKER) || batch.contains(METADATA_NOTE_MARKER)) =>
        {
            ContentKind::Metadata
        }
        kind => kind,
    }
}

/// Group chunks into prompt-sized batches joined by [`SECTION_SEPARATOR`]
#[inline]
pub fn batch_chunks(chunks: &[String], batch_size: usize) -> Vec<String> {
    chunks
        .chunks(batch_size.max(1))
        .map(|batch| batch.join(SECTION_SEPARATOR))
        .collect()
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)\s*```").expect("valid regex")
});

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[\]}])").expect("valid regex"));

/// Remove a surrounding markdown code fence, if any
#[inline]
pub fn strip_code_fences(raw: &str) -> String {
    match CODE_FENCE.captures(raw) {
        Ok(Some(captures)) => captures
            .get(1)
            .map_or_else(|| raw.trim().to_string(), |m| m.as_str().trim().to_string()),
        _ => raw.trim().to_string(),
    }
}

/// Slice from the first `open` to the last `close`, inclusive
fn extract_delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    text.get(start..=end)
}

/// Best-effort fix-ups for almost-JSON: trailing commas and raw control
/// characters inside strings
#[inline]
pub fn repair_json(text: &str) -> String {
    let without_commas = TRAILING_COMMA.replace_all(text, "$1");
    without_commas
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect()
}

fn parse_with_repair(candidate: &str, what: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            debug!("Model {} did not parse ({}), attempting repair", what, first_error);
            serde_json::from_str::<Value>(&repair_json(candidate)).map_err(|e| {
                RagError::Generation(format!(
                    "Failed to parse {what} from model output: {first_error} (after repair: {e})"
                ))
            })
        }
    }
}

/// Parse a JSON array out of free-form model output
#[inline]
pub fn parse_json_array(raw: &str) -> Result<Vec<Value>> {
    let cleaned = strip_code_fences(raw);
    let candidate = extract_delimited(&cleaned, '[', ']').unwrap_or(&cleaned);
    match parse_with_repair(candidate, "JSON array")? {
        Value::Array(items) => Ok(items),
        other => Err(RagError::Generation(format!(
            "Expected a JSON array from the model, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Parse a JSON object out of free-form model output
#[inline]
pub fn parse_json_object(raw: &str) -> Result<serde_json::Map<String, Value>> {
    let cleaned = strip_code_fences(raw);
    let candidate = extract_delimited(&cleaned, '{', '}').unwrap_or(&cleaned);
    match parse_with_repair(candidate, "JSON object")? {
        Value::Object(map) => Ok(map),
        other => Err(RagError::Generation(format!(
            "Expected a JSON object from the model, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Trimmed, non-empty string or `None`
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
