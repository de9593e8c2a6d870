// Lexical near-duplicate removal applied before generation calls

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use tracing::debug;

/// Default similarity above which two chunks count as redundant
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn overlap_ratio(a: &[String], b: &[String]) -> f32 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let b_words: HashSet<&str> = b.iter().map(String::as_str).collect();
    let common = a.iter().filter(|w| b_words.contains(w.as_str())).count();
    common as f32 / longest as f32
}

/// Word-overlap similarity: the number of words of `a` (with repetition)
/// that also occur in `b`, divided by the longer word count. Case-insensitive,
/// whitespace-tokenized. Not symmetric when `a` repeats words.
#[inline]
pub fn token_overlap(a: &str, b: &str) -> f32 {
    overlap_ratio(&tokenize(a), &tokenize(b))
}

/// Greedy left-to-right near-duplicate removal.
///
/// Each kept chunk marks every later chunk whose similarity to it exceeds
/// `threshold` as seen; seen chunks are dropped. The result is an
/// order-preserving subsequence of `chunks`. Because removal is greedy, a
/// higher threshold can still remove more chunks.
#[inline]
pub fn dedupe(chunks: &[String], threshold: f32) -> Vec<String> {
    let tokens: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(c)).collect();
    let mut seen = vec![false; chunks.len()];
    let mut unique = Vec::new();

    for i in 0..chunks.len() {
        if seen[i] {
            continue;
        }
        unique.push(chunks[i].clone());

        for j in (i + 1)..chunks.len() {
            if !seen[j] && overlap_ratio(&tokens[i], &tokens[j]) > threshold {
                seen[j] = true;
            }
        }
    }

    debug!(
        "Deduplicated {} chunks down to {} at threshold {}",
        chunks.len(),
        unique.len(),
        threshold
    );
    unique
}
