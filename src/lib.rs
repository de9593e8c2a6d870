use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No vector store has been initialized for user '{user_id}'")]
    StoreNotFound { user_id: String },

    #[error("Embedding dimension mismatch: store holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Length mismatch: {chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("No content: {0}")]
    NoContent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification used by callers to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any state was touched; not retryable.
    InvalidInput,
    /// Precondition violation on a user's vector store.
    Store,
    /// The embedding or language model service failed.
    Provider,
    /// Nothing to work with yet; the user should ingest something first.
    NoContent,
    Internal,
}

impl RagError {
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::StoreNotFound { .. }
            | Self::DimensionMismatch { .. }
            | Self::LengthMismatch { .. } => ErrorKind::Store,
            Self::Provider(_) | Self::Generation(_) => ErrorKind::Provider,
            Self::NoContent(_) => ErrorKind::NoContent,
            Self::Config(_) | Self::Database(_) | Self::Io(_) | Self::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP status a web front-end would map this error to.
    #[inline]
    pub fn status_code(&self) -> u16 {
        match *self {
            Self::InvalidInput(_) => 400,
            Self::StoreNotFound { .. } | Self::NoContent(_) => 404,
            Self::DimensionMismatch { .. } | Self::LengthMismatch { .. } => 422,
            Self::Provider(_) | Self::Generation(_) => 502,
            Self::Config(_) | Self::Database(_) | Self::Io(_) | Self::Other(_) => 500,
        }
    }

    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Provider)
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod dedup;
pub mod embeddings;
pub mod generation;
pub mod ingest;
pub mod service;
