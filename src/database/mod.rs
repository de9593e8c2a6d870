// Database module
// Per-user vector stores (JSON file or LanceDB) and the SQLite ingestion ledger

pub mod json_store;
pub mod lancedb;
pub mod sqlite;
pub mod vector_store;


use std::path::{Path, PathBuf};

use crate::{RagError, Result};

pub use vector_store::{
    ScoredChunk, StoreSnapshot, StoredChunk, StoredDocument, UserVectorStore, VectorStoreBackend,
    VectorStoreManager, cosine_distance,
};

const MAX_USER_ID_LEN: usize = 128;

/// Reject user ids that are empty, overly long, or unsafe as a directory name.
#[inline]
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(RagError::InvalidInput("User ID is required".to_string()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(RagError::InvalidInput(format!(
            "User ID must be at most {MAX_USER_ID_LEN} characters"
        )));
    }
    if user_id == "." || user_id == ".." {
        return Err(RagError::InvalidInput(format!(
            "Invalid user ID '{user_id}'"
        )));
    }
    if let Some(bad) = user_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@')))
    {
        return Err(RagError::InvalidInput(format!(
            "User ID contains invalid character '{bad}'"
        )));
    }
    Ok(())
}

/// On-disk partition owned by one user.
///
/// ```text
/// <users_dir>/<user_id>/
///     vector_db/      vector store backend files
///     data_files/     raw uploads
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPaths {
    root: PathBuf,
}

impl UserPaths {
    #[inline]
    pub fn new(users_dir: &Path, user_id: &str) -> Result<Self> {
        validate_user_id(user_id)?;
        Ok(Self {
            root: users_dir.join(user_id),
        })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn vector_db_dir(&self) -> PathBuf {
        self.root.join("vector_db")
    }

    #[inline]
    pub fn data_files_dir(&self) -> PathBuf {
        self.root.join("data_files")
    }
}
