use super::*;

fn base() -> SourceMetadata {
    SourceMetadata::new("lecture.pdf", "alice").with_extra("type", "document")
}

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

#[test]
fn empty_input_yields_no_chunks() {
    let chunks = split_text("", &base(), &ChunkingConfig::default()).expect("should split");
    assert!(chunks.is_empty());

    let chunks = split_text(" \n\n\t ", &base(), &ChunkingConfig::default()).expect("should split");
    assert!(chunks.is_empty());
}

#[test]
fn short_input_is_a_single_chunk() {
    let text = "Photosynthesis converts light into chemical energy.";
    let chunks = split_text(text, &base(), &ChunkingConfig::default()).expect("should split");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
    assert_eq!(chunks[0].metadata.chunk_index, 0);
    assert_eq!(chunks[0].metadata.source, "lecture.pdf");
    assert_eq!(chunks[0].metadata.user_id, "alice");
    assert_eq!(
        chunks[0].metadata.extra.get("type").map(String::as_str),
        Some("document")
    );
}

#[test]
fn five_thousand_characters_make_three_chunks() {
    let text = "abcdefghij".repeat(500);
    let chars: Vec<char> = text.chars().collect();

    let spans = chunk_spans(&chars, 2000, 100).expect("should compute spans");
    assert_eq!(spans, vec![0..2000, 1900..3900, 3800..5000]);

    let chunks = split_text(&text, &base(), &config(2000, 100)).expect("should split");
    assert_eq!(chunks.len(), 3);
    // chunk 2 begins 100 characters before chunk 1 ends
    let tail: String = chunks[0].text.chars().skip(1900).collect();
    let head: String = chunks[1].text.chars().take(100).collect();
    assert_eq!(tail, head);
}

#[test]
fn prefers_paragraph_boundaries() {
    let first = "a".repeat(60);
    let second = "b ".repeat(40);
    let text = format!("{first}\n\n{second}");

    let chunks = split_text(&text, &base(), &config(100, 10)).expect("should split");
    assert!(chunks.len() >= 2);
    assert!(chunks[0].text.ends_with("\n\n"));
    assert_eq!(chunks[0].text.chars().count(), 62);
}

#[test]
fn falls_back_to_sentence_then_whitespace() {
    let text = format!("{} End of one. {}", "word ".repeat(10), "tail".repeat(30));
    let chunks = split_text(&text, &base(), &config(80, 5)).expect("should split");
    assert!(chunks[0].text.ends_with(". "), "got {:?}", chunks[0].text);

    let text = format!("{} {}", "x".repeat(50), "y".repeat(80));
    let chunks = split_text(&text, &base(), &config(80, 5)).expect("should split");
    assert_eq!(chunks[0].text, format!("{} ", "x".repeat(50)));
}

#[test]
fn chunks_never_exceed_size_and_indices_are_sequential() {
    let text = "The mitochondria is the powerhouse of the cell. It produces ATP.\n".repeat(120);
    let chunks = split_text(&text, &base(), &config(500, 50)).expect("should split");

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert!(chunk.text.chars().count() <= 500);
        assert_eq!(chunk.metadata.chunk_index, i);
    }
}

#[test]
fn round_trip_reconstructs_text() {
    let samples = [
        "Plain sentence. Another one! A question? ".repeat(200),
        "para one\n\npara two is here\n\n".repeat(150),
        "ünïcödé wörds ✓ ".repeat(400),
        "z".repeat(4321),
    ];

    for text in samples {
        let chunks = split_text(&text, &base(), &config(300, 40)).expect("should split");
        assert_eq!(reassemble(&chunks, 40), text);
        for pair in chunks.windows(2) {
            let tail: String = {
                let chars: Vec<char> = pair[0].text.chars().collect();
                chars[chars.len() - 40..].iter().collect()
            };
            let head: String = pair[1].text.chars().take(40).collect();
            assert_eq!(tail, head);
        }
    }
}

#[test]
fn zero_overlap_partitions_text() {
    let text = "one two three four five six seven eight nine ten ".repeat(20);
    let chunks = split_text(&text, &base(), &config(120, 0)).expect("should split");
    let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(joined, text);
}

#[test]
fn invalid_parameters_are_rejected() {
    let err = split_text("text", &base(), &config(0, 0)).expect_err("zero size must fail");
    assert!(matches!(err, RagError::InvalidInput(_)));

    let err = split_text("text", &base(), &config(100, 100)).expect_err("overlap must be smaller");
    assert!(matches!(err, RagError::InvalidInput(_)));
}
