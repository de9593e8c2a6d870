
use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::UserPaths;
use super::json_store::JsonFileBackend;
use super::lancedb::LanceBackend;
use crate::config::{Config, StorageBackend};
use crate::embeddings::chunking::{Chunk, ChunkMetadata};
use crate::{RagError, Result};

/// One persisted row: a chunk bound to its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// Full contents of a user's store as positionally-aligned collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Established by the first write; `None` until then
    pub dimension: Option<usize>,
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
}

impl StoreSnapshot {
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All four collections have the same length and every vector has the
    /// store's dimension.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        let n = self.ids.len();
        let lengths_match =
            self.embeddings.len() == n && self.documents.len() == n && self.metadatas.len() == n;
        let dims_match = match self.dimension {
            Some(dim) => self.embeddings.iter().all(|e| e.len() == dim),
            None => n == 0,
        };
        lengths_match && dims_match
    }

    #[inline]
    pub fn push(&mut self, record: StoredChunk) {
        if self.dimension.is_none() {
            self.dimension = Some(record.embedding.len());
        }
        self.ids.push(record.id);
        self.embeddings.push(record.embedding);
        self.documents.push(record.document);
        self.metadatas.push(record.metadata);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A nearest-neighbor hit. Lower distance means more similar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

impl ScoredChunk {
    #[inline]
    pub fn relevance_score(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Persistence for one user's store.
///
/// Backends only store and return rows in insertion order; ranking and
/// invariant checks live in [`UserVectorStore`] so every backend answers
/// queries identically.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync + fmt::Debug {
    /// Whether the store has been initialized
    async fn exists(&self) -> Result<bool>;

    /// Initialize an empty store. Must be a no-op for an existing one.
    async fn create(&self) -> Result<()>;

    async fn load(&self) -> Result<StoreSnapshot>;

    async fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.load().await?.dimension)
    }

    /// Durably append all records or none of them
    async fn append(&self, records: &[StoredChunk]) -> Result<()>;

    /// Delete every persisted trace of the store
    async fn clear(&self) -> Result<()>;
}

/// Cosine distance, `1 - cos(a, b)`. A zero vector is at distance 1 from
/// everything.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    (1.0 - similarity) as f32
}

/// Hands out per-user stores and owns the per-user write locks.
#[derive(Debug)]
pub struct VectorStoreManager {
    users_dir: PathBuf,
    backend: StorageBackend,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VectorStoreManager {
    #[inline]
    pub fn new(users_dir: impl Into<PathBuf>, backend: StorageBackend) -> Self {
        Self {
            users_dir: users_dir.into(),
            backend,
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.users_dir(), config.storage.backend)
    }

    #[inline]
    pub fn backend_kind(&self) -> StorageBackend {
        self.backend
    }

    #[inline]
    pub fn user_paths(&self, user_id: &str) -> Result<UserPaths> {
        UserPaths::new(&self.users_dir, user_id)
    }

    fn backend_for(&self, paths: &UserPaths) -> Arc<dyn VectorStoreBackend> {
        match self.backend {
            StorageBackend::Json => Arc::new(JsonFileBackend::new(paths.vector_db_dir())),
            StorageBackend::LanceDb => Arc::new(LanceBackend::new(paths.vector_db_dir())),
        }
    }

    /// Locks only held by the map have no live store handle, so they are
    /// dropped here and the map stays bounded by the handles in use.
    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    #[cfg(test)]
    async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn handle(&self, user_id: &str) -> Result<UserVectorStore> {
        let paths = self.user_paths(user_id)?;
        Ok(UserVectorStore {
            user_id: user_id.to_string(),
            backend: self.backend_for(&paths),
            write_lock: self.lock_for(user_id).await,
        })
    }

    /// Load the user's store, creating an empty one if none exists yet
    #[inline]
    pub async fn initialize(&self, user_id: &str) -> Result<UserVectorStore> {
        let store = self.handle(user_id).await?;
        {
            let _guard = store.write_lock.lock().await;
            if !store.backend.exists().await? {
                store.backend.create().await?;
                info!("Created {} vector store for user {}", self.backend, user_id);
            }
        }
        Ok(store)
    }

    /// Open an existing store; fails with `StoreNotFound` if the user never
    /// initialized one
    #[inline]
    pub async fn open(&self, user_id: &str) -> Result<UserVectorStore> {
        let store = self.handle(user_id).await?;
        if !store.backend.exists().await? {
            return Err(RagError::StoreNotFound {
                user_id: user_id.to_string(),
            });
        }
        Ok(store)
    }

    #[inline]
    pub async fn exists(&self, user_id: &str) -> Result<bool> {
        let paths = self.user_paths(user_id)?;
        self.backend_for(&paths).exists().await
    }
}

/// Handle to one user's store. Clones share the same write lock.
#[derive(Debug, Clone)]
pub struct UserVectorStore {
    user_id: String,
    backend: Arc<dyn VectorStoreBackend>,
    write_lock: Arc<Mutex<()>>,
}

impl UserVectorStore {
    /// Wrap a backend directly, with a lock private to this handle and its clones
    #[inline]
    pub fn with_backend(user_id: impl Into<String>, backend: Arc<dyn VectorStoreBackend>) -> Self {
        Self {
            user_id: user_id.into(),
            backend,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    #[inline]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Append chunks with their vectors as one atomic commit. Returns the
    /// assigned ids in input order.
    #[inline]
    pub async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<Vec<String>> {
        if chunks.len() != vectors.len() {
            return Err(RagError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };
        if first.is_empty() {
            return Err(RagError::InvalidInput(
                "embedding vectors must not be empty".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;

        let expected = self.backend.dimension().await?.unwrap_or(first.len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let records: Vec<StoredChunk> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoredChunk {
                id: format!(
                    "{}:{}:{}",
                    chunk.metadata.source,
                    chunk.metadata.chunk_index,
                    Uuid::new_v4()
                ),
                embedding: vector.clone(),
                document: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
            })
            .collect();

        self.backend.append(&records).await?;

        info!(
            "Added {} chunks ({} dimensions) to store for user {}",
            records.len(),
            expected,
            self.user_id
        );
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    /// Return up to `k` chunks closest to `query` by cosine distance, nearest
    /// first. Equal distances keep insertion order.
    #[inline]
    pub async fn query_nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let snapshot = self.backend.load().await?;
        if snapshot.is_empty() {
            debug!("Nearest-neighbor query on empty store for user {}", self.user_id);
            return Ok(Vec::new());
        }
        if let Some(dim) = snapshot.dimension {
            if query.len() != dim {
                return Err(RagError::DimensionMismatch {
                    expected: dim,
                    actual: query.len(),
                });
            }
        }

        let mut ranked: Vec<(usize, f32)> = snapshot
            .embeddings
            .iter()
            .map(|embedding| cosine_distance(query, embedding))
            .enumerate()
            .collect();
        // sort_by is stable, so ties stay in insertion order
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(k);

        let results: Vec<ScoredChunk> = ranked
            .into_iter()
            .map(|(idx, distance)| ScoredChunk {
                id: snapshot.ids[idx].clone(),
                text: snapshot.documents[idx].clone(),
                metadata: snapshot.metadatas[idx].clone(),
                distance,
            })
            .collect();

        debug!(
            "Nearest-neighbor query returned {} of {} chunks for user {}",
            results.len(),
            snapshot.len(),
            self.user_id
        );
        Ok(results)
    }

    /// Every chunk in insertion order
    #[inline]
    pub async fn get_all_documents(&self) -> Result<Vec<StoredDocument>> {
        let snapshot = self.backend.load().await?;
        Ok(into_documents(snapshot, |_| true))
    }

    /// Chunks whose metadata `source` equals `source`, in insertion order
    #[inline]
    pub async fn get_documents_by_source(&self, source: &str) -> Result<Vec<StoredDocument>> {
        let snapshot = self.backend.load().await?;
        Ok(into_documents(snapshot, |metadata| metadata.source == source))
    }

    /// Distinct sources in order of first appearance
    #[inline]
    pub async fn list_sources(&self) -> Result<Vec<String>> {
        let snapshot = self.backend.load().await?;
        Ok(snapshot
            .metadatas
            .into_iter()
            .map(|m| m.source)
            .unique()
            .collect())
    }

    /// Delete all persisted state; the handle then behaves as a fresh empty store
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.backend.clear().await?;
        info!("Cleared vector store for user {}", self.user_id);
        Ok(())
    }

    #[inline]
    pub async fn len(&self) -> Result<usize> {
        Ok(self.backend.load().await?.len())
    }

    #[inline]
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    #[inline]
    pub async fn dimension(&self) -> Result<Option<usize>> {
        self.backend.dimension().await
    }

    #[inline]
    pub async fn snapshot(&self) -> Result<StoreSnapshot> {
        self.backend.load().await
    }
}

fn into_documents(
    snapshot: StoreSnapshot,
    keep: impl Fn(&ChunkMetadata) -> bool,
) -> Vec<StoredDocument> {
    snapshot
        .ids
        .into_iter()
        .zip(snapshot.documents)
        .zip(snapshot.metadatas)
        .filter(|(_, metadata)| keep(metadata))
        .map(|((id, text), metadata)| StoredDocument { id, text, metadata })
        .collect()
}
