use super::*;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn batches_join_chunks_with_section_separator() {
    let chunks = strings(&["a", "b", "c", "d", "e"]);
    let batches = batch_chunks(&chunks, 2);
    assert_eq!(
        batches,
        vec![
            format!("a{SECTION_SEPARATOR}b"),
            format!("c{SECTION_SEPARATOR}d"),
            "e".to_string(),
        ]
    );

    assert_eq!(batch_chunks(&chunks, 7).len(), 1);
    assert!(batch_chunks(&[], 3).is_empty());
}

#[test]
fn zero_batch_size_behaves_like_one() {
    let chunks = strings(&["a", "b"]);
    assert_eq!(batch_chunks(&chunks, 0), chunks);
}

#[test]
fn detects_placeholder_content_case_insensitively() {
    let chunks = strings(&[
        "Ordinary lecture text about thermodynamics.",
        "EDUCATIONAL VIDEO ANALYSIS - YouTube Video ID: abc123",
    ]);
    assert_eq!(detect_content_kind(&chunks), ContentKind::Fallback);
    assert!(detect_content_kind(&chunks).is_fallback());

    let chunks = strings(&["This video does not have an available transcript."]);
    assert_eq!(detect_content_kind(&chunks), ContentKind::Fallback);
}

#[test]
fn detects_metadata_content() {
    let chunks = strings(&[
        "VIDEO CONTENT ANALYSIS\nTitle: Intro to Graphs",
        "Note: This content is derived from video metadata (title, description, keywords)",
    ]);
    assert_eq!(detect_content_kind(&chunks), ContentKind::Metadata);
    assert!(!detect_content_kind(&chunks).is_fallback());
}

#[test]
fn metadata_heading_alone_is_ordinary_text() {
    let chunks = strings(&["Chapter 3: VIDEO CONTENT ANALYSIS techniques for film studies."]);
    assert_eq!(detect_content_kind(&chunks), ContentKind::Transcript);
}

#[test]
fn placeholder_outranks_metadata() {
    let chunks = strings(&[
        "VIDEO CONTENT ANALYSIS\nNote: This content is derived from video metadata",
        "This video does not have an available transcript.",
    ]);
    assert_eq!(detect_content_kind(&chunks), ContentKind::Fallback);
}

#[test]
fn combining_kinds_keeps_the_weakest_grounding() {
    use ContentKind::{Fallback, Metadata, Transcript};
    assert_eq!(Transcript.combine(Transcript), Transcript);
    assert_eq!(Transcript.combine(Metadata), Metadata);
    assert_eq!(Metadata.combine(Transcript), Metadata);
    assert_eq!(Metadata.combine(Fallback), Fallback);
    assert_eq!(Fallback.combine(Transcript), Fallback);
}

#[test]
fn plain_text_is_transcript_content() {
    let chunks = strings(&["The mitochondria is the powerhouse of the cell."]);
    assert_eq!(detect_content_kind(&chunks), ContentKind::Transcript);
    assert_eq!(detect_content_kind::<String>(&[]), ContentKind::Transcript);
}

#[test]
fn strips_markdown_fences() {
    assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
    assert_eq!(strip_code_fences("Here you go:\n```\n{\"a\": 1}\n```\nEnjoy"), "{\"a\": 1}");
    assert_eq!(strip_code_fences("  [3]  "), "[3]");
}

#[test]
fn parses_array_surrounded_by_prose() {
    let raw = "Sure! Here are the questions:\n[{\"question\": \"Q1\"}, {\"question\": \"Q2\"}]\nGood luck.";
    let items = parse_json_array(raw).expect("should parse array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["question"], "Q2");
}

#[test]
fn repairs_trailing_commas_and_raw_newlines() {
    let raw = "[{\"question\": \"What is\nosmosis?\", \"options\": [\"a\", \"b\",],},]";
    let items = parse_json_array(raw).expect("should parse after repair");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["question"], "What is osmosis?");
}

#[test]
fn unparseable_output_is_a_generation_error() {
    let err = parse_json_array("I cannot help with that.").expect_err("should fail");
    assert!(matches!(err, RagError::Generation(_)));

    let err = parse_json_array("{\"not\": \"an array\"}").expect_err("should fail");
    assert!(matches!(err, RagError::Generation(_)));
}

#[test]
fn parses_object_in_fenced_block() {
    let raw = "```json\n{\"sections\": [{\"title\": \"Intro\"}]}\n```";
    let object = parse_json_object(raw).expect("should parse object");
    assert!(object.contains_key("sections"));
}

#[test]
fn non_empty_trims_and_filters() {
    assert_eq!(non_empty(Some("  hi ".to_string())), Some("hi".to_string()));
    assert_eq!(non_empty(Some("   ".to_string())), None);
    assert_eq!(non_empty(None), None);
}

#[test]
fn metadata_split_across_batches_keeps_its_kind() {
    let heading = "VIDEO CONTENT ANALYSIS\nTitle: Intro to Graphs";
    let note = "Note: This content is derived from video metadata (title, description)";
    let request_kind = detect_content_kind(&[heading, note]);
    assert_eq!(request_kind, ContentKind::Metadata);

    assert_eq!(batch_content_kind(heading, request_kind), ContentKind::Metadata);
    assert_eq!(batch_content_kind(note, request_kind), ContentKind::Metadata);
    assert_eq!(
        batch_content_kind("Plain lecture text.", request_kind),
        ContentKind::Transcript
    );
    assert_eq!(
        batch_content_kind(heading, ContentKind::Transcript),
        ContentKind::Transcript
    );
    assert_eq!(
        batch_content_kind("No transcript available for this video.", request_kind),
        ContentKind::Fallback
    );
}
