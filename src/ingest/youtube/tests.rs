use super::*;
use crate::generation::{ContentKind, detect_content_kind};

#[test]
fn extracts_ids_from_common_url_forms() {
    let cases = [
        ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
        ("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42", "dQw4w9WgXcQ"),
        ("https://youtu.be/dQw4w9WgXcQ?si=abc", "dQw4w9WgXcQ"),
        ("https://www.youtube.com/embed/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
        ("https://www.youtube.com/shorts/abc_DEF-123", "abc_DEF-123"),
        ("  dQw4w9WgXcQ  ", "dQw4w9WgXcQ"),
    ];
    for (url, expected) in cases {
        assert_eq!(extract_video_id(url).expect(url), expected, "url: {url}");
    }
}

#[test]
fn rejects_non_youtube_input() {
    assert!(matches!(
        extract_video_id(""),
        Err(RagError::InvalidInput(ref msg)) if msg == "YouTube URL is required"
    ));
    assert!(matches!(
        extract_video_id("https://vimeo.com/123456"),
        Err(RagError::InvalidInput(ref msg)) if msg == "Invalid YouTube URL"
    ));
    assert!(extract_video_id("https://www.youtube.com/channel/UC123").is_err());
}

#[test]
fn fallback_text_is_detected_as_placeholder() {
    let text = fallback_transcript("dQw4w9WgXcQ");
    assert!(text.starts_with("Educational Video Analysis - YouTube Video ID: dQw4w9WgXcQ"));
    assert_eq!(detect_content_kind(&[text]), ContentKind::Fallback);
}

#[test]
fn video_metadata_carries_identifiers() {
    let metadata = video_metadata(
        "alice",
        "dQw4w9WgXcQ",
        "https://youtu.be/dQw4w9WgXcQ",
        TranscriptSource::Captions,
    );
    assert_eq!(metadata.source, "youtube_dQw4w9WgXcQ");
    assert_eq!(metadata.user_id, "alice");
    assert_eq!(metadata.extra.get("video_id").map(String::as_str), Some("dQw4w9WgXcQ"));
    assert_eq!(metadata.extra.get("has_transcript").map(String::as_str), Some("true"));
    assert_eq!(metadata.extra.get("type").map(String::as_str), Some("youtube"));
    assert_eq!(
        metadata.extra.get("transcript_source").map(String::as_str),
        Some("captions")
    );
}

#[tokio::test]
async fn fetchers_never_fail() {
    let fallback = resolve_transcript(&FallbackTranscriptFetcher, "abc").await;
    assert!(!fallback.has_transcript());
    assert_eq!(fallback.source, TranscriptSource::Fallback);
    assert!(fallback.text.contains("Educational Video Analysis"));

    let supplied = resolve_transcript(&StaticTranscriptFetcher::new("Today we cover vectors."), "abc").await;
    assert!(supplied.has_transcript());
    assert_eq!(supplied.text, "Today we cover vectors.");

    let blank = resolve_transcript(&StaticTranscriptFetcher::new("   \n"), "abc").await;
    assert!(!blank.has_transcript());
}

struct EmptyFetcher;

#[async_trait]
impl TranscriptFetcher for EmptyFetcher {
    async fn fetch(&self, _video_id: &str) -> Transcript {
        Transcript::captions("")
    }
}

#[tokio::test]
async fn empty_transcript_is_replaced_by_fallback() {
    let transcript = resolve_transcript(&EmptyFetcher, "xyz").await;
    assert_eq!(transcript.source, TranscriptSource::Fallback);
    assert_eq!(transcript.text, fallback_transcript("xyz"));
}

fn lecture_info() -> VideoInfo {
    VideoInfo {
        title: "Graph Theory: Shortest Paths".to_string(),
        description: "In this lecture you will learn how Dijkstra's algorithm finds shortest \
                      paths in weighted graphs. We also explore negative edges. #algorithms #graphs"
            .to_string(),
        channel: "CS Lectures".to_string(),
        category: "Education".to_string(),
        keywords: vec!["dijkstra".to_string(), "bellman-ford".to_string()],
        duration_seconds: 1830,
        view_count: 1200,
    }
}

#[test]
fn metadata_text_describes_the_video() {
    let text = metadata_transcript("abc123xyz00", &lecture_info());

    assert!(text.starts_with("VIDEO CONTENT ANALYSIS"));
    assert!(text.contains("Title: Graph Theory: Shortest Paths"));
    assert!(text.contains("Channel: CS Lectures"));
    assert!(text.contains("Duration: 30 minutes"));
    assert!(text.contains("KEYWORDS: dijkstra, bellman-ford"));
    assert!(text.contains("TAGS: #algorithms, #graphs"));
    assert!(text.contains("- Understanding Graph Theory"));
    assert!(text.contains("- Exploring Shortest Paths"));
    assert!(text.contains("- Key topics: dijkstra, bellman-ford"));
    assert!(text.contains("https://www.youtube.com/watch?v=abc123xyz00"));
    assert!(text.contains("Note: This content is derived from video metadata"));
    assert_eq!(detect_content_kind(&[text]), ContentKind::Metadata);
}

#[test]
fn metadata_text_fills_in_missing_fields() {
    let text = metadata_transcript("abc123xyz00", &VideoInfo::default());
    assert!(text.contains("Title: Untitled Video"));
    assert!(text.contains("Channel: Unknown Channel"));
    assert!(text.contains("No description available"));
    assert!(!text.contains("KEYWORDS:"));
    assert!(!text.contains("TAGS:"));
    assert_eq!(detect_content_kind(&[text]), ContentKind::Metadata);
}

#[test]
fn key_points_come_from_title_keywords_and_objectives() {
    let keywords: Vec<String> = (1..=7).map(|i| format!("k{i}")).collect();
    let points = extract_key_points(
        "Photosynthesis",
        "Short. Here you will understand how chloroplasts capture light. Buy merch now! \
         Discover why leaves are green in autumn months",
        &keywords,
    );
    let lines: Vec<&str> = points.lines().collect();
    assert_eq!(
        lines,
        vec![
            "- Core concepts of Photosynthesis",
            "- Key topics: k1, k2, k3, k4, k5",
            "- Here you will understand how chloroplasts capture light",
            "- Discover why leaves are green in autumn months",
        ]
    );
}

#[tokio::test]
async fn static_fetcher_prefers_captions_then_metadata() {
    let both = StaticTranscriptFetcher::new("Spoken lecture text.").with_video_info(lecture_info());
    let transcript = resolve_transcript(&both, "abc123xyz00").await;
    assert_eq!(transcript.source, TranscriptSource::Captions);
    assert_eq!(transcript.text, "Spoken lecture text.");

    let blank = StaticTranscriptFetcher::new("  ").with_video_info(lecture_info());
    let transcript = resolve_transcript(&blank, "abc123xyz00").await;
    assert_eq!(transcript.source, TranscriptSource::Metadata);
    assert!(!transcript.has_transcript());
    assert!(transcript.text.contains("Graph Theory"));

    let info_only = StaticTranscriptFetcher::from_video_info(lecture_info());
    let transcript = resolve_transcript(&info_only, "abc123xyz00").await;
    assert_eq!(transcript.source, TranscriptSource::Metadata);
}
