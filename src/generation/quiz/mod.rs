
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    ContentKind, LanguageModel, batch_chunks, batch_content_kind, detect_content_kind, non_empty,
    parse_json_array,
};
use crate::dedup::{DEFAULT_SIMILARITY_THRESHOLD, dedupe};
use crate::{RagError, Result};

/// Most questions requested from the model in a single call
pub const MAX_QUESTIONS_PER_BATCH: usize = 5;
pub const DEFAULT_NUM_QUESTIONS: usize = 10;
pub const DEFAULT_QUIZ_BATCH_SIZE: usize = 7;
pub const DEFAULT_MAX_QUESTIONS: usize = 50;
pub const OPTIONS_PER_QUESTION: usize = 4;

const MISSING_EXPLANATION: &str = "No explanation provided.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(RagError::InvalidInput(format!(
                "Invalid difficulty '{other}'. Expected easy, medium or hard"
            ))),
        }
    }
}

/// Difficulty requested for a whole quiz
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizDifficulty {
    #[default]
    Mixed,
    Easy,
    Medium,
    Hard,
}

impl QuizDifficulty {
    /// Whether a question of `difficulty` belongs in a quiz of this kind
    #[inline]
    pub fn accepts(self, difficulty: Difficulty) -> bool {
        match self {
            Self::Mixed => true,
            Self::Easy => difficulty == Difficulty::Easy,
            Self::Medium => difficulty == Difficulty::Medium,
            Self::Hard => difficulty == Difficulty::Hard,
        }
    }

    fn instruction(self) -> String {
        match self {
            Self::Mixed => "Use a mix of easy, medium and hard questions.".to_string(),
            Self::Easy => "Every question must be of easy difficulty.".to_string(),
            Self::Medium => "Every question must be of medium difficulty.".to_string(),
            Self::Hard => "Every question must be of hard difficulty.".to_string(),
        }
    }
}

impl fmt::Display for QuizDifficulty {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Mixed => write!(f, "mixed"),
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for QuizDifficulty {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mixed" => Ok(Self::Mixed),
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(RagError::InvalidInput(format!(
                "Invalid difficulty '{other}'. Expected mixed, easy, medium or hard"
            ))),
        }
    }
}

/// A validated multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    /// Exactly four options
    pub options: Vec<String>,
    /// Always one of `options`
    pub answer: String,
    pub difficulty: Difficulty,
    pub explanation: String,
}

/// Question as the model produced it, before validation
#[derive(Debug, Default, Deserialize)]
struct RawQuestion {
    question: Option<String>,
    options: Option<Vec<String>>,
    answer: Option<String>,
    difficulty: Option<String>,
    explanation: Option<String>,
}

impl RawQuestion {
    fn validate(self) -> std::result::Result<QuizQuestion, String> {
        let question = non_empty(self.question).ok_or("missing question text")?;

        let options: Vec<String> = self
            .options
            .ok_or("missing options")?
            .into_iter()
            .map(|o| o.trim().to_string())
            .collect();
        if options.len() != OPTIONS_PER_QUESTION {
            return Err(format!(
                "expected {OPTIONS_PER_QUESTION} options, got {}",
                options.len()
            ));
        }
        if options.iter().any(String::is_empty) {
            return Err("empty option".to_string());
        }

        let answer = non_empty(self.answer).ok_or("missing answer")?;
        if !options.contains(&answer) {
            return Err(format!("answer '{answer}' is not one of the options"));
        }

        let difficulty = self
            .difficulty
            .ok_or("missing difficulty")?
            .parse::<Difficulty>()
            .map_err(|e| e.to_string())?;

        let explanation =
            non_empty(self.explanation).unwrap_or_else(|| MISSING_EXPLANATION.to_string());

        Ok(QuizQuestion {
            question,
            options,
            answer,
            difficulty,
            explanation,
        })
    }
}

/// Validated questions from one model response, in response order. Items that
/// fail validation or do not match `difficulty` are dropped.
#[inline]
pub fn parse_questions(raw: &str, difficulty: QuizDifficulty) -> Result<Vec<QuizQuestion>> {
    let items = parse_json_array(raw)?;
    let total = items.len();

    let questions: Vec<QuizQuestion> = items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match validate_item(item) {
            Ok(question) if difficulty.accepts(question.difficulty) => Some(question),
            Ok(question) => {
                debug!(
                    "Dropping question {} with difficulty {} (requested {})",
                    idx, question.difficulty, difficulty
                );
                None
            }
            Err(reason) => {
                debug!("Dropping invalid question {}: {}", idx, reason);
                None
            }
        })
        .collect();

    debug!("Kept {} of {} questions from model output", questions.len(), total);
    Ok(questions)
}

fn validate_item(item: Value) -> std::result::Result<QuizQuestion, String> {
    let raw: RawQuestion = serde_json::from_value(item).map_err(|e| e.to_string())?;
    raw.validate()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizParams {
    pub num_questions: usize,
    pub difficulty: QuizDifficulty,
    pub similarity_threshold: f32,
    /// Unique chunks combined into one prompt
    pub batch_size: usize,
}

impl Default for QuizParams {
    #[inline]
    fn default() -> Self {
        Self {
            num_questions: DEFAULT_NUM_QUESTIONS,
            difficulty: QuizDifficulty::Mixed,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            batch_size: DEFAULT_QUIZ_BATCH_SIZE,
        }
    }
}

impl QuizParams {
    #[inline]
    pub fn validate(&self, max_questions: usize) -> Result<()> {
        if self.num_questions == 0 || self.num_questions > max_questions {
            return Err(RagError::InvalidInput(format!(
                "Number of questions must be between 1 and {max_questions}"
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagError::InvalidInput(
                "Similarity threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RagError::InvalidInput(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizMetadata {
    pub total_questions: usize,
    pub requested_questions: usize,
    pub difficulty: QuizDifficulty,
    pub source_chunks: usize,
    pub unique_chunks: usize,
    pub batches_processed: usize,
    pub content_kind: ContentKind,
    pub is_fallback: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    pub metadata: QuizMetadata,
}

pub struct QuizGenerator {
    llm: Arc<dyn LanguageModel>,
    max_questions: usize,
}

impl QuizGenerator {
    #[inline]
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            max_questions: DEFAULT_MAX_QUESTIONS,
        }
    }

    #[inline]
    pub fn with_max_questions(mut self, max_questions: usize) -> Self {
        self.max_questions = max_questions.max(1);
        self
    }

    /// Generate up to `params.num_questions` questions from `chunks`.
    ///
    /// Chunks are deduplicated and batched; each batch is one model call asking
    /// for at most [`MAX_QUESTIONS_PER_BATCH`] questions. A failed batch
    /// contributes nothing and the remaining batches still run. Only a quiz
    /// with zero questions is an error.
    ///
    /// The prompt template is chosen per batch, so placeholder text in one
    /// batch does not turn real material in another into a general-knowledge
    /// quiz. The reported content kind is the weakest kind of any batch used.
    #[inline]
    pub async fn generate(&self, chunks: &[String], params: &QuizParams) -> Result<Quiz> {
        params.validate(self.max_questions)?;

        let content: Vec<String> = chunks
            .iter()
            .filter(|c| !c.trim().is_empty())
            .cloned()
            .collect();
        if content.is_empty() {
            return Err(RagError::NoContent(
                "No content available to generate a quiz. Upload a document or video first."
                    .to_string(),
            ));
        }

        let unique = dedupe(&content, params.similarity_threshold);
        let batches = batch_chunks(&unique, params.batch_size);
        info!(
            "Generating {} {} questions from {} unique chunks in {} batches",
            params.num_questions,
            params.difficulty,
            unique.len(),
            batches.len()
        );

        let mut questions: Vec<QuizQuestion> = Vec::with_capacity(params.num_questions);
        let mut batches_processed = 0;
        let mut last_error = None;
        let request_kind = detect_content_kind(&unique);
        let mut kind = ContentKind::Transcript;

        for (idx, batch) in batches.iter().enumerate() {
            let remaining = params.num_questions - questions.len();
            if remaining == 0 {
                break;
            }
            let requested = remaining.min(MAX_QUESTIONS_PER_BATCH);
            let batch_kind = batch_content_kind(batch, request_kind);
            kind = kind.combine(batch_kind);
            let prompt = build_prompt(batch_kind, batch, requested, params.difficulty);
            batches_processed += 1;

            let batch_questions = match self.llm.complete(&prompt).await {
                Ok(raw) => parse_questions(&raw, params.difficulty),
                Err(e) => Err(e),
            };

            match batch_questions {
                Ok(mut batch_questions) => {
                    batch_questions.truncate(requested);
                    debug!(
                        "Batch {}/{} produced {} questions",
                        idx + 1,
                        batches.len(),
                        batch_questions.len()
                    );
                    questions.extend(batch_questions);
                }
                Err(e) => {
                    warn!("Quiz batch {}/{} failed: {}", idx + 1, batches.len(), e);
                    last_error = Some(e);
                }
            }
        }

        questions.truncate(params.num_questions);
        if questions.is_empty() {
            return Err(match last_error {
                Some(RagError::Provider(message)) => RagError::Provider(message),
                _ => RagError::Generation(
                    "Failed to generate any valid quiz questions".to_string(),
                ),
            });
        }

        info!(
            "Generated {} of {} requested questions",
            questions.len(),
            params.num_questions
        );

        Ok(Quiz {
            metadata: QuizMetadata {
                total_questions: questions.len(),
                requested_questions: params.num_questions,
                difficulty: params.difficulty,
                source_chunks: content.len(),
                unique_chunks: unique.len(),
                batches_processed,
                content_kind: kind,
                is_fallback: kind.is_fallback(),
                generated_at: Utc::now(),
            },
            questions,
        })
    }
}

fn build_prompt(kind: ContentKind, batch: &str, count: usize, difficulty: QuizDifficulty) -> String {
    let preamble = match kind {
        ContentKind::Transcript => format!(
            "You are an expert educator writing an exam-preparation quiz.\n\
             Create exactly {count} multiple-choice questions that test understanding of the \
             study material below. Base every question only on that material."
        ),
        ContentKind::Metadata => format!(
            "You are an expert educator writing an exam-preparation quiz.\n\
             The material below describes a video through its title, description and tags \
             rather than a transcript. Create exactly {count} multiple-choice questions about \
             the subjects it covers, drawing on well-established knowledge of those subjects."
        ),
        ContentKind::Fallback => format!(
            "You are an expert educator writing an exam-preparation quiz.\n\
             No transcript is available for the source video, so the material below only \
             identifies its general subject. Create exactly {count} multiple-choice questions \
             that test general knowledge of the educational topics it mentions. Do not ask \
             about the placeholder text itself."
        ),
    };

    format!(
        "{preamble}\n\n{}\n\n\
         Rules:\n\
         - Each question has exactly 4 options.\n\
         - \"answer\" must repeat one of the options word for word.\n\
         - \"difficulty\" is one of \"easy\", \"medium\" or \"hard\".\n\
         - \"explanation\" briefly says why the answer is correct.\n\n\
         Respond with a JSON array only, no other text:\n\
         [{{\"question\": \"...\", \"options\": [\"...\", \"...\", \"...\", \"...\"], \
         \"answer\": \"...\", \"difficulty\": \"medium\", \"explanation\": \"...\"}}]\n\n\
         MATERIAL:\n{batch}",
        difficulty.instruction()
    )
}
