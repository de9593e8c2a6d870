use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::database::VectorStoreManager;
use crate::database::sqlite::Database;
use crate::embeddings::OllamaClient;
use crate::generation::{ChatRequest, QuizDifficulty};
use crate::ingest::FileUpload;
use crate::ingest::youtube::{StaticTranscriptFetcher, VideoInfo};
use crate::service::{NotesRequest, QuizRequest, StudyService, YoutubeRequest};

async fn read_video_info(path: &Path) -> Result<VideoInfo> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read video info {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse video info {}", path.display()))
}

async fn load_service() -> Result<StudyService> {
    let config = Config::load_default()?;
    StudyService::from_config(config)
        .await
        .context("Failed to initialize study service")
}

fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Upload a document file for a user
#[inline]
pub async fn upload_file(user_id: &str, path: &Path) -> Result<()> {
    let service = load_service().await?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let bar = spinner(format!("Processing {file_name}"));
    let result = service
        .upload_file(user_id, FileUpload::new(file_name, bytes))
        .await;
    bar.finish_and_clear();

    print_json(&result?)
}

/// Ingest a plain-text file, bypassing upload validation
#[inline]
pub async fn ingest_text_file(user_id: &str, path: &Path, source: Option<String>) -> Result<()> {
    let service = load_service().await?;
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let source = source.unwrap_or_else(|| {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "text".to_string())
    });

    let bar = spinner(format!("Ingesting {source}"));
    let result = service.ingest_text(user_id, &source, &text).await;
    bar.finish_and_clear();

    print_json(&result?)
}

/// Ingest a YouTube video, optionally with a transcript read from a file
/// and video metadata read from a JSON file
#[inline]
pub async fn ingest_youtube(
    user_id: &str,
    url: String,
    transcript: Option<&Path>,
    video_info: Option<&Path>,
) -> Result<()> {
    let mut service = load_service().await?;

    let mut fetcher = match transcript {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read transcript {}", path.display()))?;
            Some(StaticTranscriptFetcher::new(text))
        }
        None => None,
    };
    if let Some(path) = video_info {
        let info = read_video_info(path).await?;
        fetcher = Some(match fetcher {
            Some(fetcher) => fetcher.with_video_info(info),
            None => StaticTranscriptFetcher::from_video_info(info),
        });
    }
    if let Some(fetcher) = fetcher {
        service = service.with_transcript_fetcher(Arc::new(fetcher));
    }

    let bar = spinner("Processing video");
    let result = service.ingest_youtube(user_id, &YoutubeRequest { url }).await;
    bar.finish_and_clear();

    print_json(&result?)
}

#[inline]
pub async fn chat(user_id: &str, message: String, max_results: Option<usize>) -> Result<()> {
    let service = load_service().await?;
    let request = ChatRequest {
        message,
        max_results,
    };

    let bar = spinner("Thinking");
    let result = service.chat(user_id, &request).await;
    bar.finish_and_clear();

    print_json(&result?)
}

#[inline]
pub async fn generate_quiz(
    user_id: &str,
    cache_id: Option<String>,
    num_questions: Option<usize>,
    difficulty: Option<QuizDifficulty>,
) -> Result<()> {
    let service = load_service().await?;
    let request = QuizRequest {
        cache_id,
        num_questions,
        difficulty,
        ..QuizRequest::default()
    };

    let bar = spinner("Generating quiz");
    let result = service.generate_quiz(user_id, &request).await;
    bar.finish_and_clear();

    print_json(&result?)
}

#[inline]
pub async fn generate_notes(user_id: &str, cache_id: Option<String>, markdown: bool) -> Result<()> {
    let service = load_service().await?;
    let request = NotesRequest {
        cache_id,
        ..NotesRequest::default()
    };

    let bar = spinner("Generating notes");
    let result = service.generate_notes(user_id, &request).await;
    bar.finish_and_clear();

    let response = result?;
    if markdown {
        print!("{}", response.markdown);
        Ok(())
    } else {
        print_json(&response.notes)
    }
}

#[inline]
pub async fn list_files(user_id: &str) -> Result<()> {
    let service = load_service().await?;
    print_json(&service.list_files(user_id).await?)
}

#[inline]
pub async fn clear_user(user_id: &str) -> Result<()> {
    let service = load_service().await?;
    let response = service.clear_user_data(user_id).await?;
    info!("Cleared {} sources for {}", response.sources_removed, user_id);
    print_json(&response)
}

/// Show configuration, ledger and Ollama health
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default().unwrap_or_default();

    println!("📊 prep-rag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Ledger Status:");
    match Database::initialize_from_config(&config).await {
        Ok(_) => println!("   ✅ SQLite: Connected ({})", config.ledger_path().display()),
        Err(e) => println!("   ❌ SQLite: Failed to connect - {:#}", e),
    }

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let health = tokio::task::spawn_blocking(move || client.health_check())
                .await
                .context("Health check task panicked")?;
            match health {
                Ok(()) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                    println!("   📋 Embedding Model: {}", config.ollama.embedding_model);
                    println!("   📋 Generation Model: {}", config.ollama.generation_model);
                    println!("   🔢 Batch Size: {}", config.ollama.batch_size);
                }
                Err(e) => println!("   ⚠️  Ollama: Unhealthy - {:#}", e),
            }
        }
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {:#}", e),
    }

    println!("🔍 Vector Store Status:");
    let manager = VectorStoreManager::from_config(&config);
    println!("   Backend: {}", manager.backend_kind());
    println!("   Users Directory: {}", config.users_dir().display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn video_info_file_with_missing_fields() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let path = temp_dir.path().join("info.json");
        std::fs::write(&path, r#"{"title": "Cell Biology", "keywords": ["mitosis"]}"#)
            .expect("should write");

        let info = read_video_info(&path).await.expect("should parse");
        assert_eq!(info.title, "Cell Biology");
        assert_eq!(info.keywords, vec!["mitosis".to_string()]);
        assert!(info.description.is_empty());
    }

    #[tokio::test]
    async fn malformed_video_info_names_the_file() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{not json").expect("should write");

        let err = read_video_info(&path).await.expect_err("should fail");
        assert!(err.to_string().contains("broken.json"));
    }
}
