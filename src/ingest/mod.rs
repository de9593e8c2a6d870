// Ingestion: turning uploads and transcripts into embedded chunks in a user's store

pub mod youtube;


use async_trait::async_trait;
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

use crate::config::UploadConfig;
use crate::database::UserVectorStore;
use crate::embeddings::{ChunkingConfig, EmbeddingProvider, SourceMetadata, split_text};
use crate::{RagError, Result};

static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Canonical form of extracted text: LF line endings, no control characters
/// other than newline and tab, no trailing spaces, at most one blank line in a
/// row, trimmed.
#[inline]
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned: String = unified
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();
    let stripped = cleaned
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_BLANK_LINES
        .replace_all(&stripped, "\n\n")
        .trim()
        .to_string()
}

/// A file as received from the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    #[inline]
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercased extension without the dot
    #[inline]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
    /// Any other extension the configuration allows
    Other(String),
}

impl DocumentKind {
    #[inline]
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" | "md" => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }

    #[inline]
    pub fn mime_type(&self) -> &'static str {
        match *self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Text => "text/plain",
            Self::Other(_) => "application/octet-stream",
        }
    }
}

impl fmt::Display for DocumentKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Pdf => write!(f, "pdf"),
            Self::Docx => write!(f, "docx"),
            Self::Text => write!(f, "text"),
            Self::Other(ref ext) => write!(f, "{ext}"),
        }
    }
}

/// Check an upload against the configured limits before anything is stored
#[inline]
pub fn validate_upload(upload: &FileUpload, config: &UploadConfig) -> Result<DocumentKind> {
    if upload.file_name.trim().is_empty() {
        return Err(RagError::InvalidInput("No file selected".to_string()));
    }
    if upload.bytes.is_empty() {
        return Err(RagError::InvalidInput("No file provided".to_string()));
    }

    let allowed = || config.allowed_extensions.join(", ");
    let Some(extension) = upload.extension() else {
        return Err(RagError::InvalidInput(format!(
            "Invalid file type. Allowed types: {}",
            allowed()
        )));
    };
    if !config.allows_extension(&extension) {
        return Err(RagError::InvalidInput(format!(
            "Invalid file type. Allowed types: {}",
            allowed()
        )));
    }

    if upload.bytes.len() as u64 > config.max_file_size_bytes {
        return Err(RagError::InvalidInput(format!(
            "File too large. Maximum size is {} MB",
            config.max_file_size_bytes / (1024 * 1024)
        )));
    }

    Ok(DocumentKind::from_extension(&extension))
}

/// Final path component of `file_name` with anything outside
/// `[A-Za-z0-9._-]` replaced by `_`
#[inline]
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = Path::new(file_name.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.').to_string();
    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}

/// Turns raw upload bytes into plain text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], kind: &DocumentKind) -> Result<String>;
}

/// Accepts bytes that are already UTF-8 text, whatever their extension
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8TextExtractor;

#[async_trait]
impl TextExtractor for Utf8TextExtractor {
    async fn extract(&self, bytes: &[u8], kind: &DocumentKind) -> Result<String> {
        std::str::from_utf8(bytes).map(str::to_string).map_err(|_| {
            RagError::InvalidInput(format!(
                "Could not extract text from {kind} file: content is not UTF-8 text"
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub source: String,
    pub chunks_processed: usize,
    pub dimension: Option<usize>,
}

/// Normalizes, chunks and embeds text, then commits it to a store in one write
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, chunking: ChunkingConfig) -> Self {
        Self { embedder, chunking }
    }

    /// The store is only written after every chunk has a vector; a provider
    /// failure leaves it untouched.
    #[inline]
    pub async fn ingest_text(
        &self,
        store: &UserVectorStore,
        text: &str,
        metadata: SourceMetadata,
    ) -> Result<IngestReport> {
        let normalized = normalize_text(text);
        let chunks = split_text(&normalized, &metadata, &self.chunking)?;
        if chunks.is_empty() {
            return Err(RagError::NoContent(format!(
                "No text content could be extracted from '{}'",
                metadata.source
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        debug!("Embedding {} chunks from {}", texts.len(), metadata.source);
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Provider(format!(
                "Embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        store.add(&chunks, &vectors).await?;
        info!(
            "Ingested {} chunks from {} for user {}",
            chunks.len(),
            metadata.source,
            store.user_id()
        );

        Ok(IngestReport {
            source: metadata.source,
            chunks_processed: chunks.len(),
            dimension: vectors.first().map(Vec::len),
        })
    }
}
