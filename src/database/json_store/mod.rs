
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::database::vector_store::{StoreSnapshot, StoredChunk, VectorStoreBackend};
use crate::embeddings::chunking::ChunkMetadata;
use crate::{RagError, Result};

const STORE_FILE: &str = "store.json";
const TEMP_FILE: &str = "store.json.tmp";
const FORMAT_VERSION: u32 = 1;

/// On-disk layout of `store.json`
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    dimension: Option<usize>,
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

impl From<StoreFile> for StoreSnapshot {
    fn from(file: StoreFile) -> Self {
        Self {
            dimension: file.dimension,
            ids: file.ids,
            embeddings: file.embeddings,
            documents: file.documents,
            metadatas: file.metadatas,
        }
    }
}

impl From<StoreSnapshot> for StoreFile {
    fn from(snapshot: StoreSnapshot) -> Self {
        Self {
            version: FORMAT_VERSION,
            dimension: snapshot.dimension,
            ids: snapshot.ids,
            embeddings: snapshot.embeddings,
            documents: snapshot.documents,
            metadatas: snapshot.metadatas,
        }
    }
}

/// Stores a user's collection as a single JSON document.
///
/// Every write replaces the whole file via write-to-temp, fsync, rename, so a
/// crash leaves either the old or the new contents on disk.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    #[inline]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn store_path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read(&self) -> Result<StoreSnapshot> {
        let path = self.store_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoreSnapshot::default()),
            Err(e) => return Err(e.into()),
        };

        let file: StoreFile = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::Database(format!("Corrupt vector store {}: {}", path.display(), e))
        })?;
        if file.version != FORMAT_VERSION {
            return Err(RagError::Database(format!(
                "Unsupported vector store version {} in {}",
                file.version,
                path.display()
            )));
        }

        let snapshot = StoreSnapshot::from(file);
        if !snapshot.is_consistent() {
            return Err(RagError::Database(format!(
                "Corrupt vector store {}: collections are not aligned",
                path.display()
            )));
        }
        Ok(snapshot)
    }

    async fn write_atomic(&self, snapshot: StoreSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let bytes = serde_json::to_vec(&StoreFile::from(snapshot))
            .map_err(|e| RagError::Database(format!("Failed to serialize vector store: {e}")))?;

        let temp_path = self.dir.join(TEMP_FILE);
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, self.store_path()).await?;
        debug!(
            "Committed {} bytes to {}",
            bytes.len(),
            self.store_path().display()
        );
        Ok(())
    }
}

#[async_trait]
impl VectorStoreBackend for JsonFileBackend {
    async fn exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.store_path()).await?)
    }

    async fn create(&self) -> Result<()> {
        if self.exists().await? {
            return Ok(());
        }
        self.write_atomic(StoreSnapshot::default()).await
    }

    async fn load(&self) -> Result<StoreSnapshot> {
        self.read().await
    }

    async fn append(&self, records: &[StoredChunk]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        let mut snapshot = self.read().await?;
        let expected = snapshot.dimension.unwrap_or(first.embedding.len());
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.embedding.len(),
            });
        }

        for record in records {
            snapshot.push(record.clone());
        }
        self.write_atomic(snapshot).await
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Vector store {} already absent", self.dir.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
