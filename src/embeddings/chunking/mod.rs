#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::debug;

use crate::{RagError, Result};

/// Configuration for text chunking. Sizes are measured in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared between the end of one chunk and the start of the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 100,
        }
    }
}

/// Metadata shared by every chunk cut from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub source: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Source-specific fields such as `video_id`, `url` or `type`
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SourceMetadata {
    #[inline]
    pub fn new(source: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub user_id: String,
    /// Zero-based position of the chunk within its source
    pub chunk_index: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// A bounded segment of source text plus its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Split `text` into overlapping chunks that inherit `base` metadata.
///
/// Empty or whitespace-only input yields no chunks. Every chunk except the
/// first starts exactly `chunk_overlap` characters before the previous one
/// ends, so dropping that prefix and concatenating rebuilds `text`.
#[inline]
pub fn split_text(text: &str, base: &SourceMetadata, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let chars: Vec<char> = text.chars().collect();
    let spans = chunk_spans(&chars, config.chunk_size, config.chunk_overlap)?;

    let chunks: Vec<Chunk> = spans
        .into_iter()
        .enumerate()
        .map(|(chunk_index, span)| Chunk {
            text: chars[span].iter().collect(),
            metadata: ChunkMetadata {
                source: base.source.clone(),
                user_id: base.user_id.clone(),
                chunk_index,
                timestamp: base.timestamp,
                extra: base.extra.clone(),
            },
        })
        .collect();

    debug!(
        "Split {} characters from '{}' into {} chunks",
        chars.len(),
        base.source,
        chunks.len()
    );
    Ok(chunks)
}

/// Compute chunk boundaries as character ranges.
#[inline]
pub fn chunk_spans(chars: &[char], chunk_size: usize, overlap: usize) -> Result<Vec<Range<usize>>> {
    if chunk_size == 0 {
        return Err(RagError::InvalidInput(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(RagError::InvalidInput(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
        )));
    }
    if chars.iter().all(|c| c.is_whitespace()) {
        return Ok(Vec::new());
    }

    let len = chars.len();
    let mut spans = Vec::with_capacity(len / (chunk_size - overlap) + 1);
    let mut start = 0;

    loop {
        if len - start <= chunk_size {
            spans.push(start..len);
            return Ok(spans);
        }

        // A cut must leave more than `overlap` characters behind it or the
        // next chunk would not advance.
        let end = find_cut(chars, start + overlap + 1, start + chunk_size);
        spans.push(start..end);
        start = end - overlap;
    }
}

/// Pick the exclusive end of a chunk within `min..=max`, preferring the
/// largest semantic boundary available.
fn find_cut(chars: &[char], min: usize, max: usize) -> usize {
    let candidates = || (min..=max).rev();

    let paragraph = candidates().find(|&i| i >= 2 && chars[i - 2] == '\n' && chars[i - 1] == '\n');
    if let Some(end) = paragraph {
        return end;
    }

    let sentence = candidates().find(|&i| {
        chars[i - 1] == '\n'
            || (i >= 2 && chars[i - 1].is_whitespace() && matches!(chars[i - 2], '.' | '!' | '?'))
    });
    if let Some(end) = sentence {
        return end;
    }

    candidates()
        .find(|&i| chars[i - 1].is_whitespace())
        .unwrap_or(max)
}

/// Rebuild the original text from chunks produced with the given overlap.
#[inline]
pub fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(&chunk.text);
        } else {
            text.extend(chunk.text.chars().skip(overlap));
        }
    }
    text
}
