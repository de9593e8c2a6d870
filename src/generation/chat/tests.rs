use super::*;
use crate::config::StorageBackend;
use crate::database::VectorStoreManager;
use crate::embeddings::chunking::{ChunkingConfig, SourceMetadata, split_text};
use crate::generation::test_support::{LetterEmbedder, ScriptedModel, letter_vector};
use tempfile::TempDir;

async fn seeded_store(temp_dir: &TempDir, docs: &[(&str, &str)]) -> UserVectorStore {
    let manager = VectorStoreManager::new(temp_dir.path().join("users"), StorageBackend::Json);
    let store = manager.initialize("alice").await.expect("should initialize");
    for (source, text) in docs {
        let chunks = split_text(text, &SourceMetadata::new(*source, "alice"), &ChunkingConfig::default())
            .expect("should chunk");
        let vectors: Vec<Vec<f32>> = chunks.iter().map(|c| letter_vector(&c.text)).collect();
        store.add(&chunks, &vectors).await.expect("should add");
    }
    store
}

fn engine(model: Arc<ScriptedModel>) -> ChatEngine {
    ChatEngine::new(Arc::new(LetterEmbedder), model)
}

#[tokio::test]
async fn answers_from_nearest_chunks() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = seeded_store(
        &temp_dir,
        &[
            ("bio.pdf", "aaaa aaaa aaaa"),
            ("chem.pdf", "zzzz zzzz zzzz"),
            ("mixed.pdf", "aaaa zzzz"),
        ],
    )
    .await;

    let model = Arc::new(ScriptedModel::replying(&["  The answer is A.  "]));
    let mut request = ChatRequest::new("  aaa?  ");
    request.max_results = Some(2);

    let response = engine(model.clone())
        .answer(&store, &request)
        .await
        .expect("should answer");

    assert_eq!(response.question, "aaa?");
    assert_eq!(response.answer, "The answer is A.");
    assert!(!response.is_fallback);
    let sources: Vec<&str> = response.context_used.iter().map(|c| c.source.as_str()).collect();
    assert_eq!(sources, vec!["bio.pdf", "mixed.pdf"]);
    assert!(response.context_used[0].relevance_score >= response.context_used[1].relevance_score);
    assert!((response.context_used[0].relevance_score - 1.0).abs() < 1e-6);

    let prompt = &model.prompts()[0];
    assert!(prompt.contains("Source: bio.pdf\nContent: aaaa aaaa aaaa\n\n---\n\nSource: mixed.pdf"));
    assert!(prompt.contains("QUESTION: aaa?"));
}

#[tokio::test]
async fn empty_message_is_invalid() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = seeded_store(&temp_dir, &[("a.pdf", "some text")]).await;
    let model = Arc::new(ScriptedModel::default());

    let err = engine(model.clone())
        .answer(&store, &ChatRequest::new("   "))
        .await
        .expect_err("should fail");
    assert!(matches!(err, RagError::InvalidInput(_)));
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn max_results_is_bounded() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = seeded_store(&temp_dir, &[("a.pdf", "some text")]).await;
    let model = Arc::new(ScriptedModel::default());

    for bad in [0, 21] {
        let request = ChatRequest {
            message: "hello".to_string(),
            max_results: Some(bad),
        };
        let err = engine(model.clone())
            .answer(&store, &request)
            .await
            .expect_err("should fail");
        assert!(matches!(err, RagError::InvalidInput(_)));
    }
}

#[tokio::test]
async fn empty_store_is_no_content() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = seeded_store(&temp_dir, &[]).await;
    let model = Arc::new(ScriptedModel::default());

    let err = engine(model.clone())
        .answer(&store, &ChatRequest::new("anything?"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, RagError::NoContent(_)));
    assert_eq!(err.status_code(), 404);
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn placeholder_context_is_flagged() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = seeded_store(
        &temp_dir,
        &[(
            "youtube_abc123xyz00",
            "Educational Video Analysis - YouTube Video ID: abc123xyz00",
        )],
    )
    .await;
    let model = Arc::new(ScriptedModel::replying(&["General answer."]));

    let response = engine(model.clone())
        .answer(&store, &ChatRequest::new("What is this video about?"))
        .await
        .expect("should answer");
    assert!(response.is_fallback);
    assert!(model.prompts()[0].contains("No transcript is available"));
}

#[tokio::test]
async fn provider_failure_propagates() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = seeded_store(&temp_dir, &[("a.pdf", "some text")]).await;
    let model = Arc::new(ScriptedModel::new(vec![Err(RagError::Provider(
        "model offline".to_string(),
    ))]));

    let err = engine(model)
        .answer(&store, &ChatRequest::new("hello"))
        .await
        .expect_err("should fail");
    assert!(err.is_retryable());
}

#[test]
fn default_max_results_is_clamped() {
    let model = Arc::new(ScriptedModel::default());
    assert_eq!(engine(model.clone()).default_max_results, 5);
    assert_eq!(engine(model.clone()).with_default_max_results(100).default_max_results, 20);
    assert_eq!(engine(model).with_default_max_results(0).default_max_results, 1);
}
