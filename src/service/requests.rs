use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::database::sqlite::models::{IngestedSource, SourceKind, TranscriptSource};
use crate::generation::{Notes, QuizDifficulty};
use crate::ingest::youtube::video_source;
use crate::{RagError, Result};

/// Scope token returned by ingestion and accepted by quiz and notes requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheId {
    Youtube { video_id: String },
    Document { source: String },
}

impl CacheId {
    /// Parse `yt_<user>_<video>` or `doc_<user>_<source>`. A token minted for
    /// another user is rejected.
    #[inline]
    pub fn parse(cache_id: &str, user_id: &str) -> Result<Self> {
        let scoped = |prefix: &str| {
            cache_id
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix(user_id))
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|rest| !rest.is_empty())
                .map(str::to_string)
        };

        if let Some(video_id) = scoped("yt_") {
            return Ok(Self::Youtube { video_id });
        }
        if let Some(source) = scoped("doc_") {
            return Ok(Self::Document { source });
        }
        Err(RagError::InvalidInput("Invalid cache ID format".to_string()))
    }

    /// The `source` metadata value of the chunks this id refers to
    #[inline]
    pub fn source(&self) -> String {
        match *self {
            Self::Youtube { ref video_id } => video_source(video_id),
            Self::Document { ref source } => source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub chunks_processed: usize,
    pub cache_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YoutubeRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YoutubeResponse {
    pub message: String,
    pub video_id: String,
    pub chunks_processed: usize,
    pub cache_id: String,
    pub has_transcript: bool,
    pub transcript_source: TranscriptSource,
    pub already_processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextIngestResponse {
    pub message: String,
    pub source: String,
    pub chunks_processed: usize,
    pub cache_id: String,
}

/// Quiz options; unset fields take the configured defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizRequest {
    pub cache_id: Option<String>,
    pub num_questions: Option<usize>,
    pub difficulty: Option<QuizDifficulty>,
    pub similarity_threshold: Option<f32>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesRequest {
    pub cache_id: Option<String>,
    pub title: Option<String>,
    pub include_summary: bool,
    pub include_key_terms: bool,
    pub similarity_threshold: Option<f32>,
    pub batch_size: Option<usize>,
}

impl Default for NotesRequest {
    #[inline]
    fn default() -> Self {
        Self {
            cache_id: None,
            title: None,
            include_summary: true,
            include_key_terms: true,
            similarity_threshold: None,
            batch_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesResponse {
    pub notes: Notes,
    pub markdown: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub source: String,
    pub kind: SourceKind,
    pub file_name: Option<String>,
    pub video_id: Option<String>,
    pub chunk_count: i64,
    pub has_transcript: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_source: Option<TranscriptSource>,
    pub ingested_date: NaiveDateTime,
    pub cache_id: String,
}

impl From<IngestedSource> for FileEntry {
    #[inline]
    fn from(source: IngestedSource) -> Self {
        let cache_id = source.cache_id();
        Self {
            source: source.source,
            kind: source.kind,
            file_name: source.file_name,
            video_id: source.video_id,
            chunk_count: source.chunk_count,
            has_transcript: source.has_transcript,
            transcript_source: source.transcript_source,
            ingested_date: source.ingested_date,
            cache_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesResponse {
    pub user_id: String,
    pub files: Vec<FileEntry>,
    /// Chunks currently in the user's vector store
    pub total_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResponse {
    pub user_id: String,
    pub message: String,
    pub sources_removed: u64,
}
