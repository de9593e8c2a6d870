#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ContentKind, LanguageModel, detect_content_kind};
use crate::database::{ScoredChunk, UserVectorStore};
use crate::embeddings::EmbeddingProvider;
use crate::{RagError, Result};

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const MAX_RESULTS_LIMIT: usize = 20;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Number of chunks to retrieve; the engine default when `None`
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl ChatRequest {
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            max_results: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSource {
    pub source: String,
    pub relevance_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub question: String,
    pub answer: String,
    /// Retrieved chunks in rank order
    pub context_used: Vec<ContextSource>,
    pub is_fallback: bool,
    pub timestamp: DateTime<Utc>,
}

/// Answers questions from the chunks nearest to them in a user's store
pub struct ChatEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    default_max_results: usize,
}

impl ChatEngine {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            embedder,
            llm,
            default_max_results: DEFAULT_MAX_RESULTS,
        }
    }

    #[inline]
    pub fn with_default_max_results(mut self, max_results: usize) -> Self {
        self.default_max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    #[inline]
    pub async fn answer(&self, store: &UserVectorStore, request: &ChatRequest) -> Result<ChatResponse> {
        let question = request.message.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput("Message is required".to_string()));
        }
        let max_results = request.max_results.unwrap_or(self.default_max_results);
        if max_results == 0 || max_results > MAX_RESULTS_LIMIT {
            return Err(RagError::InvalidInput(format!(
                "max_results must be between 1 and {MAX_RESULTS_LIMIT}"
            )));
        }

        if store.is_empty().await? {
            return Err(RagError::NoContent(
                "No documents found. Please upload a document first.".to_string(),
            ));
        }

        let mut vectors = self.embedder.embed(&[question.to_string()]).await?;
        let query = match vectors.pop() {
            Some(vector) if vectors.is_empty() => vector,
            _ => {
                return Err(RagError::Provider(
                    "Embedding provider did not return exactly one query vector".to_string(),
                ));
            }
        };

        let hits = store.query_nearest(&query, max_results).await?;
        debug!("Retrieved {} chunks for chat question", hits.len());

        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        let kind = detect_content_kind(&texts);
        let prompt = build_prompt(kind, &build_context(&hits), question);

        let answer = self.llm.complete(&prompt).await?.trim().to_string();
        info!(
            "Answered chat question for user {} using {} chunks",
            store.user_id(),
            hits.len()
        );

        Ok(ChatResponse {
            question: question.to_string(),
            answer,
            context_used: hits
                .iter()
                .map(|hit| ContextSource {
                    source: hit.metadata.source.clone(),
                    relevance_score: hit.relevance_score(),
                })
                .collect(),
            is_fallback: kind.is_fallback(),
            timestamp: Utc::now(),
        })
    }
}

/// Retrieved chunks formatted for the prompt, in rank order
#[inline]
pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| format!("Source: {}\nContent: {}", hit.metadata.source, hit.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn build_prompt(kind: ContentKind, context: &str, question: &str) -> String {
    let instructions = match kind {
        ContentKind::Transcript => {
            "You are a helpful study assistant. Answer the student's question using the \
             context from their study materials below. If the context does not contain the \
             answer, say so plainly instead of guessing."
        }
        ContentKind::Metadata => {
            "You are a helpful study assistant. The context below describes a video through its \
             metadata rather than a transcript. Answer the student's question about the subjects \
             it covers, and mention that the answer is based on the video's description."
        }
        ContentKind::Fallback => {
            "You are a helpful study assistant. No transcript is available for the video the \
             student uploaded, so the context below only identifies its general subject. Answer \
             the question from general knowledge of that subject and say that the answer is not \
             based on the video itself."
        }
    };

    format!("{instructions}\n\nCONTEXT:\n{context}\n\nQUESTION: {question}\n\nANSWER:")
}
