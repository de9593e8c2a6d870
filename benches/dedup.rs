use criterion::{Criterion, criterion_group, criterion_main};
use prep_rag::dedup::{DEFAULT_SIMILARITY_THRESHOLD, dedupe};
use std::hint::black_box;

fn chunks() -> Vec<String> {
    (0..200)
        .map(|i| {
            // every third chunk repeats an earlier one with a small edit
            let topic = if i % 3 == 0 { i / 3 } else { i };
            format!(
                "Chunk about topic {topic}: cell membranes regulate transport with channels, \
                 pumps and carriers while maintaining gradients number {topic} {}",
                i % 2
            )
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let chunks = chunks();
    c.bench_function("dedupe", |b| {
        b.iter(|| dedupe(black_box(&chunks), black_box(DEFAULT_SIMILARITY_THRESHOLD)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
