#[cfg(test)]
mod tests;

use async_trait::async_trait;
use fancy_regex::Regex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::embeddings::SourceMetadata;
use crate::generation::{METADATA_MARKER, METADATA_NOTE_MARKER};
use crate::{RagError, Result};

pub use crate::database::sqlite::models::TranscriptSource;

static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/watch\?(?:[^#\s]*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)([A-Za-z0-9_-]+)",
    )
    .expect("valid regex")
});

static BARE_VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").expect("valid regex"));

static TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:|\x{2013}\x{2014}-]").expect("valid regex"));

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid regex"));

const OBJECTIVE_WORDS: &[&str] = &["learn", "understand", "discover", "explore"];
const DESCRIPTION_CONTEXT_CHARS: usize = 500;

/// Pull the video id out of any common YouTube URL form, or accept a bare
/// 11-character id
#[inline]
pub fn extract_video_id(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(RagError::InvalidInput("YouTube URL is required".to_string()));
    }

    if let Ok(Some(captures)) = VIDEO_URL.captures(url) {
        if let Some(id) = captures.get(1) {
            return Ok(id.as_str().to_string());
        }
    }
    if BARE_VIDEO_ID.is_match(url).unwrap_or(false) {
        return Ok(url.to_string());
    }

    Err(RagError::InvalidInput("Invalid YouTube URL".to_string()))
}

/// `source` metadata value for a video's chunks
#[inline]
pub fn video_source(video_id: &str) -> String {
    format!("youtube_{video_id}")
}

#[inline]
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Metadata shared by every chunk of an ingested video
#[inline]
pub fn video_metadata(
    user_id: &str,
    video_id: &str,
    url: &str,
    transcript_source: TranscriptSource,
) -> SourceMetadata {
    SourceMetadata::new(video_source(video_id), user_id)
        .with_extra("type", "youtube")
        .with_extra("video_id", video_id)
        .with_extra("url", url)
        .with_extra("has_transcript", transcript_source.has_transcript().to_string())
        .with_extra("transcript_source", transcript_source.to_string())
}

/// Placeholder study text used when no transcript can be obtained
#[inline]
pub fn fallback_transcript(video_id: &str) -> String {
    format!(
        "Educational Video Analysis - YouTube Video ID: {video_id}\n\n\
         This video does not have an available transcript, so its spoken content could not be \
         analyzed. Study material generated from it draws on general educational knowledge of \
         the subject rather than the specifics of the video.\n\n\
         To get study material tailored to this video:\n\
         - Watch the video and write down its key concepts, definitions and examples.\n\
         - Upload lecture slides, notes or a reading that covers the same topic.\n\
         - Paste a transcript of the video if one is available from another source.\n\n\
         Video link: {}",
        watch_url(video_id)
    )
}

/// What is publicly known about a video when its captions are not
/// available. Every field is optional in JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub title: String,
    pub description: String,
    pub channel: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub duration_seconds: u64,
    pub view_count: u64,
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() { default } else { value }
}

/// Bullet list of likely learning points, inferred from the title, the
/// first keywords and description sentences that state an objective
#[inline]
pub fn extract_key_points(title: &str, description: &str, keywords: &[String]) -> String {
    let mut points = Vec::new();

    let title_parts: Vec<&str> = TITLE_SEPARATOR
        .split(title)
        .filter_map(std::result::Result::ok)
        .collect();
    match title_parts.as_slice() {
        [first, second, ..] => {
            points.push(format!("- Understanding {}", first.trim()));
            points.push(format!("- Exploring {}", second.trim()));
        }
        _ => points.push(format!("- Core concepts of {}", title.trim())),
    }

    if !keywords.is_empty() {
        points.push(format!("- Key topics: {}", keywords.iter().take(5).join(", ")));
    }

    SENTENCE_END
        .split(description)
        .filter_map(std::result::Result::ok)
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            OBJECTIVE_WORDS.iter().any(|word| lower.contains(word))
        })
        .take(2)
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > 20)
        .for_each(|sentence| points.push(format!("- {sentence}")));

    points.join("\n")
}

/// Study text describing a video from its metadata, for videos without
/// captions. Carries both markers that identify metadata-derived content.
#[inline]
pub fn metadata_transcript(video_id: &str, info: &VideoInfo) -> String {
    let title = or_default(&info.title, "Untitled Video");
    let description = or_default(&info.description, "No description available");
    let channel = or_default(&info.channel, "Unknown Channel");
    let category = or_default(&info.category, "Education");

    let hashtags: Vec<&str> = HASHTAG
        .find_iter(description)
        .filter_map(std::result::Result::ok)
        .map(|m| m.as_str())
        .collect();

    let mut text = String::new();
    let _ = writeln!(text, "{METADATA_MARKER}\n=====================\n");
    let _ = writeln!(text, "Title: {title}\n");
    let _ = writeln!(text, "Channel: {channel}");
    let _ = writeln!(text, "Category: {category}");
    let _ = writeln!(text, "Duration: {} minutes", info.duration_seconds / 60);
    let _ = writeln!(text, "Views: {}\n", info.view_count);
    let _ = writeln!(text, "DESCRIPTION:\n{description}\n");
    if !info.keywords.is_empty() {
        let _ = writeln!(text, "KEYWORDS: {}", info.keywords.join(", "));
    }
    if !hashtags.is_empty() {
        let _ = writeln!(text, "TAGS: {}", hashtags.join(", "));
    }

    let context = if description.chars().count() > DESCRIPTION_CONTEXT_CHARS {
        let head: String = description.chars().take(DESCRIPTION_CONTEXT_CHARS).collect();
        format!("{head}...\n\n[See full description above for complete details]")
    } else {
        description.to_string()
    };

    let _ = writeln!(
        text,
        "\nCONTENT CONTEXT:\n\
         This is an educational video about \"{title}\" presented by {channel}. Based on the \
         title, description and metadata, this video covers important concepts related to {}.\n\n\
         The video's description provides the following context and learning objectives:\n\
         {context}\n",
        category.to_lowercase()
    );
    let _ = writeln!(
        text,
        "KEY LEARNING POINTS (inferred from title and description):\n{}\n",
        extract_key_points(title, description, &info.keywords)
    );
    let _ = writeln!(text, "Video URL: {}\n", watch_url(video_id));
    let _ = write!(
        text,
        "{METADATA_NOTE_MARKER} (title, description, keywords) as captions are not available. \
         Questions and notes should focus on the concepts and topics explicitly mentioned in the \
         description and title."
    );
    text
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub source: TranscriptSource,
}

impl Transcript {
    #[inline]
    pub fn captions(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: TranscriptSource::Captions,
        }
    }

    #[inline]
    pub fn from_metadata(video_id: &str, info: &VideoInfo) -> Self {
        Self {
            text: metadata_transcript(video_id, info),
            source: TranscriptSource::Metadata,
        }
    }

    #[inline]
    pub fn fallback(video_id: &str) -> Self {
        Self {
            text: fallback_transcript(video_id),
            source: TranscriptSource::Fallback,
        }
    }

    /// `true` only for the spoken content itself
    #[inline]
    pub fn has_transcript(&self) -> bool {
        self.source.has_transcript()
    }
}

/// Obtains the text of a video. Implementations never fail: without captions
/// they describe the video from its metadata, and without metadata they
/// return the fallback transcript.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Transcript;
}

/// Always returns the placeholder transcript
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackTranscriptFetcher;

#[async_trait]
impl TranscriptFetcher for FallbackTranscriptFetcher {
    async fn fetch(&self, video_id: &str) -> Transcript {
        debug!("No transcript source configured for video {}", video_id);
        Transcript::fallback(video_id)
    }
}

/// Serves text supplied up front: a transcript (such as one read from a
/// file), video metadata to describe the video by, or both. The transcript
/// wins when it is non-empty.
#[derive(Debug, Clone, Default)]
pub struct StaticTranscriptFetcher {
    text: Option<String>,
    info: Option<VideoInfo>,
}

impl StaticTranscriptFetcher {
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            info: None,
        }
    }

    #[inline]
    pub fn from_video_info(info: VideoInfo) -> Self {
        Self {
            text: None,
            info: Some(info),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_video_info(mut self, info: VideoInfo) -> Self {
        self.info = Some(info);
        self
    }
}

#[async_trait]
impl TranscriptFetcher for StaticTranscriptFetcher {
    async fn fetch(&self, video_id: &str) -> Transcript {
        if let Some(text) = self.text.as_deref() {
            if !text.trim().is_empty() {
                return Transcript::captions(text);
            }
            warn!("Supplied transcript for video {} is empty", video_id);
        }
        match &self.info {
            Some(info) => {
                debug!("Describing video {} from its metadata", video_id);
                Transcript::from_metadata(video_id, info)
            }
            None => Transcript::fallback(video_id),
        }
    }
}

/// Fetch a transcript, substituting the fallback for empty text
#[inline]
pub async fn resolve_transcript(fetcher: &dyn TranscriptFetcher, video_id: &str) -> Transcript {
    let transcript = fetcher.fetch(video_id).await;
    if transcript.text.trim().is_empty() {
        warn!("Empty transcript for video {}, using fallback", video_id);
        return Transcript::fallback(video_id);
    }
    transcript
}
