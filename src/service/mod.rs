// Service layer: typed operations over a user's store, ledger and generators

mod requests;


use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::sqlite::models::{NewIngestedSource, SourceKind, TranscriptSource};
use crate::database::sqlite::Database;
use crate::database::{StoredDocument, UserVectorStore, VectorStoreManager};
use crate::embeddings::{EmbeddingProvider, OllamaClient, SourceMetadata};
use crate::generation::{
    ChatEngine, ChatRequest, ChatResponse, LanguageModel, NotesGenerator, NotesParams, Quiz,
    QuizGenerator, QuizParams,
};
use crate::ingest::youtube::{
    FallbackTranscriptFetcher, TranscriptFetcher, resolve_transcript, video_metadata,
    video_source, watch_url,
};
use crate::ingest::{
    FileUpload, Ingestor, TextExtractor, Utf8TextExtractor, sanitize_file_name, validate_upload,
};
use crate::{RagError, Result};

pub use requests::{
    CacheId, ClearResponse, FileEntry, FilesResponse, NotesRequest, NotesResponse, QuizRequest,
    TextIngestResponse, UploadResponse, YoutubeRequest, YoutubeResponse,
};

fn ledger_error(error: anyhow::Error) -> RagError {
    RagError::Database(format!("{error:#}"))
}

/// Entry point for every per-user operation.
///
/// All collaborators are injected; nothing is global. Each operation works on
/// the store of the user it names and no other.
pub struct StudyService {
    config: Config,
    stores: VectorStoreManager,
    ledger: Database,
    ingestor: Ingestor,
    extractor: Arc<dyn TextExtractor>,
    transcripts: Arc<dyn TranscriptFetcher>,
    quiz: QuizGenerator,
    notes: NotesGenerator,
    chat: ChatEngine,
}

impl StudyService {
    /// Build a service with the default text extractor and transcript fetcher
    #[inline]
    pub async fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;
        let ledger = Database::initialize_from_config(&config)
            .await
            .map_err(ledger_error)?;

        let generation = &config.generation;
        Ok(Self {
            stores: VectorStoreManager::from_config(&config),
            ingestor: Ingestor::new(Arc::clone(&embedder), config.chunking.clone()),
            extractor: Arc::new(Utf8TextExtractor),
            transcripts: Arc::new(FallbackTranscriptFetcher),
            quiz: QuizGenerator::new(Arc::clone(&llm))
                .with_max_questions(generation.max_questions_per_quiz),
            notes: NotesGenerator::new(Arc::clone(&llm)),
            chat: ChatEngine::new(embedder, llm)
                .with_default_max_results(generation.chat_max_results),
            ledger,
            config,
        })
    }

    /// Build a service that uses the configured Ollama server for both
    /// embeddings and completions
    #[inline]
    pub async fn from_config(config: Config) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(&config.ollama)?);
        Self::new(config, Arc::clone(&client) as Arc<dyn EmbeddingProvider>, client).await
    }

    #[inline]
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[inline]
    pub fn with_transcript_fetcher(mut self, fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        self.transcripts = fetcher;
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn stores(&self) -> &VectorStoreManager {
        &self.stores
    }

    /// Validate, extract, store and ingest an uploaded document
    #[inline]
    pub async fn upload_file(&self, user_id: &str, upload: FileUpload) -> Result<UploadResponse> {
        let paths = self.stores.user_paths(user_id)?;
        let kind = validate_upload(&upload, &self.config.upload)?;
        let file_name = sanitize_file_name(&upload.file_name);

        let text = self.extractor.extract(&upload.bytes, &kind).await?;
        let store = self.stores.initialize(user_id).await?;

        let data_dir = paths.data_files_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        tokio::fs::write(data_dir.join(&file_name), &upload.bytes).await?;
        debug!("Saved upload {} for user {}", file_name, user_id);

        let metadata = SourceMetadata::new(&file_name, user_id)
            .with_extra("type", kind.to_string())
            .with_extra("file_name", &file_name);
        let report = self.ingestor.ingest_text(&store, &text, metadata).await?;

        let recorded = self
            .record(NewIngestedSource {
                user_id: user_id.to_string(),
                source: file_name.clone(),
                kind: SourceKind::Document,
                file_name: Some(file_name.clone()),
                video_id: None,
                size_bytes: i64::try_from(upload.bytes.len()).ok(),
                chunk_count: report.chunks_processed as i64,
                has_transcript: false,
                transcript_source: None,
            })
            .await?;

        Ok(UploadResponse {
            message: "File processed successfully".to_string(),
            filename: file_name,
            chunks_processed: report.chunks_processed,
            cache_id: recorded,
            user_id: user_id.to_string(),
        })
    }

    /// Ingest already-extracted text under `source`
    #[inline]
    pub async fn ingest_text(
        &self,
        user_id: &str,
        source: &str,
        text: &str,
    ) -> Result<TextIngestResponse> {
        self.stores.user_paths(user_id)?;
        let source = source.trim();
        if source.is_empty() {
            return Err(RagError::InvalidInput("Source name is required".to_string()));
        }

        let store = self.stores.initialize(user_id).await?;
        let metadata = SourceMetadata::new(source, user_id).with_extra("type", "text");
        let report = self.ingestor.ingest_text(&store, text, metadata).await?;

        let cache_id = self
            .record(NewIngestedSource {
                user_id: user_id.to_string(),
                source: source.to_string(),
                kind: SourceKind::Text,
                file_name: None,
                video_id: None,
                size_bytes: i64::try_from(text.len()).ok(),
                chunk_count: report.chunks_processed as i64,
                has_transcript: false,
                transcript_source: None,
            })
            .await?;

        Ok(TextIngestResponse {
            message: "Text processed successfully".to_string(),
            source: source.to_string(),
            chunks_processed: report.chunks_processed,
            cache_id,
        })
    }

    /// Ingest a video's transcript, or the placeholder when none is available.
    /// A video the user already ingested is not processed again.
    #[inline]
    pub async fn ingest_youtube(
        &self,
        user_id: &str,
        request: &YoutubeRequest,
    ) -> Result<YoutubeResponse> {
        self.stores.user_paths(user_id)?;
        let video_id = crate::ingest::youtube::extract_video_id(&request.url)?;
        let source = video_source(&video_id);
        let cache_id = format!("yt_{user_id}_{video_id}");

        if let Some(existing) = self
            .ledger
            .get_source(user_id, &source)
            .await
            .map_err(ledger_error)?
        {
            if self.stores.exists(user_id).await? {
                info!("Video {} already processed for user {}", video_id, user_id);
                return Ok(YoutubeResponse {
                    message: "Video already processed".to_string(),
                    video_id,
                    chunks_processed: usize::try_from(existing.chunk_count).unwrap_or_default(),
                    cache_id,
                    has_transcript: existing.has_transcript,
                    transcript_source: existing.transcript_source.unwrap_or(
                        if existing.has_transcript {
                            TranscriptSource::Captions
                        } else {
                            TranscriptSource::Fallback
                        },
                    ),
                    already_processed: true,
                });
            }
            warn!(
                "Ledger lists video {} for user {} but the store is missing, re-ingesting",
                video_id, user_id
            );
        }

        let transcript = resolve_transcript(self.transcripts.as_ref(), &video_id).await;
        let store = self.stores.initialize(user_id).await?;
        let metadata = video_metadata(
            user_id,
            &video_id,
            &watch_url(&video_id),
            transcript.source,
        );
        let report = self
            .ingestor
            .ingest_text(&store, &transcript.text, metadata)
            .await?;

        self.record(NewIngestedSource {
            user_id: user_id.to_string(),
            source,
            kind: SourceKind::Youtube,
            file_name: None,
            video_id: Some(video_id.clone()),
            size_bytes: None,
            chunk_count: report.chunks_processed as i64,
            has_transcript: transcript.has_transcript(),
            transcript_source: Some(transcript.source),
        })
        .await?;

        let message = match transcript.source {
            TranscriptSource::Captions => "YouTube video processed successfully",
            TranscriptSource::Metadata => {
                "YouTube video processed from its title and description; no captions were available"
            }
            TranscriptSource::Fallback => {
                "YouTube video processed without a transcript; using general educational content"
            }
        };
        Ok(YoutubeResponse {
            message: message.to_string(),
            video_id,
            chunks_processed: report.chunks_processed,
            cache_id,
            has_transcript: transcript.has_transcript(),
            transcript_source: transcript.source,
            already_processed: false,
        })
    }

    #[inline]
    pub async fn chat(&self, user_id: &str, request: &ChatRequest) -> Result<ChatResponse> {
        let store = self.stores.open(user_id).await?;
        self.chat.answer(&store, request).await
    }

    #[inline]
    pub async fn generate_quiz(&self, user_id: &str, request: &QuizRequest) -> Result<Quiz> {
        let generation = &self.config.generation;
        let params = QuizParams {
            num_questions: request.num_questions.unwrap_or(QuizParams::default().num_questions),
            difficulty: request.difficulty.unwrap_or_default(),
            similarity_threshold: request
                .similarity_threshold
                .unwrap_or(generation.similarity_threshold),
            batch_size: request.batch_size.unwrap_or(generation.quiz_batch_size),
        };
        params.validate(generation.max_questions_per_quiz)?;

        let store = self.stores.open(user_id).await?;
        let texts = self.scoped_texts(&store, request.cache_id.as_deref()).await?;
        self.quiz.generate(&texts, &params).await
    }

    #[inline]
    pub async fn generate_notes(&self, user_id: &str, request: &NotesRequest) -> Result<NotesResponse> {
        let generation = &self.config.generation;
        let defaults = NotesParams::default();
        let params = NotesParams {
            title: request.title.clone().unwrap_or(defaults.title),
            include_summary: request.include_summary,
            include_key_terms: request.include_key_terms,
            similarity_threshold: request
                .similarity_threshold
                .unwrap_or(generation.similarity_threshold),
            batch_size: request.batch_size.unwrap_or(generation.notes_batch_size),
        };
        params.validate()?;

        let store = self.stores.open(user_id).await?;
        let texts = self.scoped_texts(&store, request.cache_id.as_deref()).await?;
        let notes = self.notes.generate(&texts, &params).await?;
        let markdown = notes.to_markdown();
        Ok(NotesResponse { notes, markdown })
    }

    /// Everything the user has ingested, newest first
    #[inline]
    pub async fn list_files(&self, user_id: &str) -> Result<FilesResponse> {
        self.stores.user_paths(user_id)?;
        let files: Vec<FileEntry> = self
            .ledger
            .list_sources(user_id)
            .await
            .map_err(ledger_error)?
            .into_iter()
            .map(FileEntry::from)
            .collect();

        let total_chunks = match self.stores.open(user_id).await {
            Ok(store) => store.len().await?,
            Err(RagError::StoreNotFound { .. }) => 0,
            Err(e) => return Err(e),
        };

        Ok(FilesResponse {
            user_id: user_id.to_string(),
            files,
            total_chunks,
        })
    }

    /// Delete the user's vector store, saved uploads and ledger entries
    #[inline]
    pub async fn clear_user_data(&self, user_id: &str) -> Result<ClearResponse> {
        let paths = self.stores.user_paths(user_id)?;

        match self.stores.open(user_id).await {
            Ok(store) => store.clear().await?,
            Err(RagError::StoreNotFound { .. }) => {
                debug!("No vector store to clear for user {}", user_id);
            }
            Err(e) => return Err(e),
        }

        match tokio::fs::remove_dir_all(paths.data_files_dir()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let sources_removed = self
            .ledger
            .delete_user_sources(user_id)
            .await
            .map_err(ledger_error)?;

        info!(
            "Cleared data for user {} ({} sources)",
            user_id, sources_removed
        );
        Ok(ClearResponse {
            user_id: user_id.to_string(),
            message: "All user data cleared".to_string(),
            sources_removed,
        })
    }

    async fn scoped_texts(
        &self,
        store: &UserVectorStore,
        cache_id: Option<&str>,
    ) -> Result<Vec<String>> {
        let documents: Vec<StoredDocument> = match cache_id {
            Some(cache_id) => {
                let source = CacheId::parse(cache_id, store.user_id())?.source();
                let documents = store.get_documents_by_source(&source).await?;
                if documents.is_empty() {
                    return Err(RagError::NoContent(
                        "No content found for this cache ID".to_string(),
                    ));
                }
                documents
            }
            None => store.get_all_documents().await?,
        };

        if documents.is_empty() {
            return Err(RagError::NoContent(
                "No documents found. Please upload a document first.".to_string(),
            ));
        }
        Ok(documents.into_iter().map(|d| d.text).collect())
    }

    /// Record an ingestion in the ledger and return its cache id
    async fn record(&self, source: NewIngestedSource) -> Result<String> {
        let recorded = self
            .ledger
            .record_source(source)
            .await
            .map_err(ledger_error)?;
        Ok(recorded.cache_id())
    }
}
