use super::*;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn overlap_is_case_insensitive_and_whitespace_tokenized() {
    assert!((token_overlap("The Cell  membrane", "the cell\nmembrane") - 1.0).abs() < f32::EPSILON);
    assert!((token_overlap("a b c d", "a b x y") - 0.5).abs() < f32::EPSILON);
    assert!(token_overlap("alpha", "beta").abs() < f32::EPSILON);
    assert!(token_overlap("", "").abs() < f32::EPSILON);
    assert!(token_overlap("", "word").abs() < f32::EPSILON);
}

#[test]
fn overlap_divides_by_longer_chunk() {
    // 2 common words / max(2, 4)
    assert!((token_overlap("red blue", "red blue green yellow") - 0.5).abs() < f32::EPSILON);
    assert!((token_overlap("red blue green yellow", "red blue") - 0.5).abs() < f32::EPSILON);
}

#[test]
fn repeated_words_count_from_first_argument() {
    assert!((token_overlap("x x x", "x y z") - 1.0).abs() < f32::EPSILON);
    assert!((token_overlap("x y z", "x x x") - (1.0 / 3.0)).abs() < 1e-6);
}

#[test]
fn drops_near_duplicates_and_keeps_order() {
    let chunks = strings(&[
        "photosynthesis happens in the chloroplast of plant cells",
        "cellular respiration releases energy stored in glucose",
        "Photosynthesis happens in the chloroplast of plant cells",
        "mitosis produces two identical daughter cells",
        "cellular respiration releases energy stored in glucose molecules",
    ]);

    let unique = dedupe(&chunks, 0.85);
    assert_eq!(
        unique,
        strings(&[
            "photosynthesis happens in the chloroplast of plant cells",
            "cellular respiration releases energy stored in glucose",
            "mitosis produces two identical daughter cells",
        ])
    );
}

#[test]
fn threshold_is_strict() {
    let chunks = strings(&["a b c d", "a b x y"]);
    assert_eq!(dedupe(&chunks, 0.5).len(), 2);
    assert_eq!(dedupe(&chunks, 0.49).len(), 1);
}

#[test]
fn only_kept_chunks_mark_later_ones() {
    // B is removed by A; C resembles B but not A, so C survives
    let chunks = strings(&["w1 w2 w3 w4", "w1 w2 w3 w5", "w5 w2 w3 w6"]);
    let unique = dedupe(&chunks, 0.7);
    assert_eq!(unique, strings(&["w1 w2 w3 w4", "w5 w2 w3 w6"]));
}

#[test]
fn empty_and_single_inputs() {
    assert!(dedupe(&[], 0.85).is_empty());
    assert_eq!(dedupe(&strings(&["solo"]), 0.85), strings(&["solo"]));
}

fn corpus() -> Vec<String> {
    strings(&[
        "enzymes lower activation energy of reactions",
        "enzymes lower the activation energy of chemical reactions",
        "the french revolution began in 1789",
        "the french revolution began in paris in 1789",
        "newton formulated three laws of motion",
        "newton formulated the three laws of motion and gravity",
        "enzymes lower activation energy of reactions",
        "water boils at one hundred degrees celsius",
        "water boils at 100 degrees celsius at sea level",
        "dna is a double helix",
    ])
}

#[test]
fn dedupe_is_idempotent() {
    let chunks = corpus();
    for threshold in [0.0, 0.3, 0.5, 0.6, 0.7, 0.85, 0.95, 1.0] {
        let once = dedupe(&chunks, threshold);
        let twice = dedupe(&once, threshold);
        assert_eq!(once, twice, "threshold {threshold}");
    }
}

// Holds for this corpus only; see `greedy_removal_is_not_monotone_in_threshold`.
#[test]
fn raising_threshold_never_removes_more() {
    let chunks = corpus();
    let thresholds = [0.0, 0.2, 0.4, 0.5, 0.6, 0.7, 0.8, 0.85, 0.9, 1.0];
    let removed: Vec<usize> = thresholds
        .iter()
        .map(|&t| chunks.len() - dedupe(&chunks, t).len())
        .collect();

    for pair in removed.windows(2) {
        assert!(pair[1] <= pair[0], "removed counts {removed:?}");
    }
}

fn words(prefix: &str, range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|i| format!("{prefix}{i}")).collect()
}

#[test]
fn greedy_removal_is_not_monotone_in_threshold() {
    // A removes B at 0.85 but not at 0.9; a surviving B then removes C and D.
    let b = words("b", 1..=100);
    let c = [words("b", 1..=91), words("c", 1..=9)].concat();
    let d = [words("b", 10..=100), words("d", 1..=9)].concat();
    let a = [
        words("b", 1..=9),
        words("b", 92..=100),
        words("b", 10..=79),
        words("a", 1..=12),
    ]
    .concat();
    let chunks: Vec<String> = [a, b, c, d].iter().map(|w| w.join(" ")).collect();

    assert!((token_overlap(&chunks[0], &chunks[1]) - 0.88).abs() < 1e-6);
    assert!((token_overlap(&chunks[1], &chunks[2]) - 0.91).abs() < 1e-6);
    assert!((token_overlap(&chunks[1], &chunks[3]) - 0.91).abs() < 1e-6);
    assert!((token_overlap(&chunks[2], &chunks[3]) - 0.82).abs() < 1e-6);

    let lenient = dedupe(&chunks, 0.85);
    let strict = dedupe(&chunks, 0.9);
    assert_eq!(lenient, vec![chunks[0].clone(), chunks[2].clone(), chunks[3].clone()]);
    assert_eq!(strict, vec![chunks[0].clone(), chunks[1].clone()]);
    assert!(chunks.len() - strict.len() > chunks.len() - lenient.len());
}
