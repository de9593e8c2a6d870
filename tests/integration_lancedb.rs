#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Vector store behavior on the LanceDB backend with realistic embedding sizes

use prep_rag::RagError;
use prep_rag::config::StorageBackend;
use prep_rag::database::VectorStoreManager;
use prep_rag::embeddings::{ChunkingConfig, SourceMetadata, split_text};
use tempfile::TempDir;

const DIMENSION: usize = 768;

/// Deterministic 768-dimensional vector; nearby seeds give nearby vectors
fn realistic_vector(seed: f32) -> Vec<f32> {
    (0..DIMENSION)
        .map(|i| (i as f32).mul_add(0.01, seed).sin() * 0.1)
        .collect()
}

fn manager(temp_dir: &TempDir) -> VectorStoreManager {
    VectorStoreManager::new(temp_dir.path().join("users"), StorageBackend::LanceDb)
}

#[tokio::test]
async fn lancedb_store_round_trip_and_ranking() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let manager = manager(&temp_dir);
    let store = manager.initialize("alice").await.expect("should initialize");
    assert!(store.is_empty().await.expect("is_empty"));

    let text = (0..12)
        .map(|i| format!("Section {i}: the citric acid cycle produces NADH and FADH2. ").repeat(10))
        .collect::<Vec<_>>()
        .join("\n\n");
    let chunks = split_text(
        &text,
        &SourceMetadata::new("krebs.pdf", "alice").with_extra("type", "pdf"),
        &ChunkingConfig::default(),
    )
    .expect("should chunk");
    let vectors: Vec<Vec<f32>> = (0..chunks.len())
        .map(|i| realistic_vector(i as f32))
        .collect();

    let ids = store.add(&chunks, &vectors).await.expect("should add");
    assert_eq!(ids.len(), chunks.len());
    assert_eq!(store.dimension().await.expect("dimension"), Some(DIMENSION));

    // reopening sees the same data
    let reopened = manager.open("alice").await.expect("should open");
    let docs = reopened.get_all_documents().await.expect("documents");
    assert_eq!(docs.len(), chunks.len());
    for (doc, chunk) in docs.iter().zip(&chunks) {
        assert_eq!(doc.text, chunk.text);
        assert_eq!(doc.metadata.chunk_index, chunk.metadata.chunk_index);
        assert_eq!(doc.metadata.extra.get("type").map(String::as_str), Some("pdf"));
    }

    let hits = reopened
        .query_nearest(&realistic_vector(0.0), 3)
        .await
        .expect("should query");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, ids[0]);
    assert!(hits[0].distance < 1e-5);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[tokio::test]
async fn lancedb_rejects_dimension_changes() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = manager(&temp_dir)
        .initialize("bob")
        .await
        .expect("should initialize");

    let chunks = split_text(
        "Short note about enzymes.",
        &SourceMetadata::new("enzymes.txt", "bob"),
        &ChunkingConfig::default(),
    )
    .expect("should chunk");
    store
        .add(&chunks, &[realistic_vector(1.0)])
        .await
        .expect("should add");

    let err = store
        .add(&chunks, &[vec![0.5; 384]])
        .await
        .expect_err("should reject");
    assert!(matches!(
        err,
        RagError::DimensionMismatch {
            expected: DIMENSION,
            actual: 384
        }
    ));
    assert_eq!(store.len().await.expect("len"), 1);

    let err = store
        .query_nearest(&[1.0, 0.0], 1)
        .await
        .expect_err("should reject query");
    assert!(matches!(err, RagError::DimensionMismatch { .. }));
}

#[tokio::test]
async fn lancedb_clear_and_source_listing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let manager = manager(&temp_dir);
    let store = manager.initialize("carol").await.expect("should initialize");

    for (i, source) in ["a.pdf", "youtube_abc", "a.pdf", "b.docx"].iter().enumerate() {
        let chunks = split_text(
            &format!("Content number {i} from {source}"),
            &SourceMetadata::new(*source, "carol"),
            &ChunkingConfig::default(),
        )
        .expect("should chunk");
        store
            .add(&chunks, &[realistic_vector(i as f32)])
            .await
            .expect("should add");
    }

    assert_eq!(
        store.list_sources().await.expect("sources"),
        vec!["a.pdf", "youtube_abc", "b.docx"]
    );
    assert_eq!(
        store
            .get_documents_by_source("a.pdf")
            .await
            .expect("documents")
            .len(),
        2
    );

    store.clear().await.expect("should clear");
    assert!(!manager.exists("carol").await.expect("exists"));
    assert!(matches!(
        manager.open("carol").await,
        Err(RagError::StoreNotFound { .. })
    ));
    assert!(store.is_empty().await.expect("cleared store reads as empty"));
}
