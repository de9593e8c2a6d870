// Embeddings module
// Text chunking plus the embedding provider boundary and its Ollama implementation

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

pub use chunking::{Chunk, ChunkMetadata, ChunkingConfig, SourceMetadata, split_text};
pub use ollama::OllamaClient;

/// Converts texts into fixed-length vectors.
///
/// Implementations return exactly one vector per input, in input order. A call
/// either succeeds for every text or fails as a whole with
/// [`crate::RagError::Provider`]; callers never see a partial result.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>>;
}
