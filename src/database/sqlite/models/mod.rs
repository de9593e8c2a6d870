
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// One source a user has ingested into their vector store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IngestedSource {
    pub id: i64,
    pub user_id: String,
    /// Value of the `source` metadata field on the stored chunks
    pub source: String,
    pub kind: SourceKind,
    pub file_name: Option<String>,
    pub video_id: Option<String>,
    pub size_bytes: Option<i64>,
    pub chunk_count: i64,
    pub has_transcript: bool,
    /// Where a video's text came from; `None` for documents and plain text
    pub transcript_source: Option<TranscriptSource>,
    pub ingested_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Document,
    Youtube,
    Text,
}

impl std::fmt::Display for SourceKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            SourceKind::Document => write!(f, "Document"),
            SourceKind::Youtube => write!(f, "YouTube"),
            SourceKind::Text => write!(f, "Text"),
        }
    }
}

/// Origin of the text ingested for a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    /// The spoken content, from captions or a supplied transcript
    Captions,
    /// A description assembled from the title, description and keywords
    Metadata,
    /// Placeholder text; nothing about the video was available
    Fallback,
}

impl TranscriptSource {
    #[inline]
    pub fn has_transcript(self) -> bool {
        self == Self::Captions
    }
}

impl std::fmt::Display for TranscriptSource {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            TranscriptSource::Captions => write!(f, "captions"),
            TranscriptSource::Metadata => write!(f, "metadata"),
            TranscriptSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIngestedSource {
    pub user_id: String,
    pub source: String,
    pub kind: SourceKind,
    pub file_name: Option<String>,
    pub video_id: Option<String>,
    pub size_bytes: Option<i64>,
    pub chunk_count: i64,
    pub has_transcript: bool,
    pub transcript_source: Option<TranscriptSource>,
}

impl IngestedSource {
    /// Cache token callers use to scope generation to this source
    #[inline]
    pub fn cache_id(&self) -> String {
        match (self.kind, self.video_id.as_deref()) {
            (SourceKind::Youtube, Some(video_id)) => format!("yt_{}_{}", self.user_id, video_id),
            _ => format!("doc_{}_{}", self.user_id, self.source),
        }
    }
}
