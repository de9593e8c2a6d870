
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    ContentKind, LanguageModel, SECTION_SEPARATOR, batch_chunks, batch_content_kind,
    detect_content_kind, non_empty, parse_json_array, parse_json_object, strip_code_fences,
};
use crate::dedup::{DEFAULT_SIMILARITY_THRESHOLD, dedupe};
use crate::{RagError, Result};

pub const DEFAULT_NOTES_TITLE: &str = "Generated Notes";
pub const DEFAULT_NOTES_BATCH_SIZE: usize = 5;

/// Upper bound on material sent to the summary prompt, in characters
const SUMMARY_CONTEXT_CHARS: usize = 12_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    pub subtitle: String,
    pub points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTerm {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSection {
    pub title: String,
    pub content: String,
    pub subsections: Vec<Subsection>,
    pub key_terms: Vec<KeyTerm>,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesMetadata {
    pub total_sections: usize,
    pub source_chunks: usize,
    pub unique_chunks: usize,
    pub batches_processed: usize,
    pub content_kind: ContentKind,
    pub is_fallback: bool,
    pub generated_at: DateTime<Utc>,
}

/// Structured study notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notes {
    pub title: String,
    /// Empty when no summary was requested or the summary call failed
    pub summary: String,
    pub sections: Vec<NoteSection>,
    pub metadata: NotesMetadata,
}

impl Notes {
    /// Render as Markdown: `#` title, `##` summary and sections, `###`
    /// subsections, key terms and examples
    #[inline]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);

        if !self.summary.is_empty() {
            let _ = writeln!(out, "## Summary\n\n{}\n", self.summary);
        }

        for section in &self.sections {
            let _ = writeln!(out, "## {}\n", section.title);
            if !section.content.is_empty() {
                let _ = writeln!(out, "{}\n", section.content);
            }

            for subsection in &section.subsections {
                let _ = writeln!(out, "### {}\n", subsection.subtitle);
                for point in &subsection.points {
                    let _ = writeln!(out, "- {point}");
                }
                out.push('\n');
            }

            if !section.key_terms.is_empty() {
                out.push_str("### Key Terms\n\n");
                for term in &section.key_terms {
                    let _ = writeln!(out, "- **{}**: {}", term.term, term.definition);
                }
                out.push('\n');
            }

            if !section.examples.is_empty() {
                out.push_str("### Examples\n\n");
                for example in &section.examples {
                    let _ = writeln!(out, "- {example}");
                }
                out.push('\n');
            }
        }

        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        out.push('\n');
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesParams {
    pub title: String,
    pub include_summary: bool,
    pub include_key_terms: bool,
    pub similarity_threshold: f32,
    pub batch_size: usize,
}

impl Default for NotesParams {
    #[inline]
    fn default() -> Self {
        Self {
            title: DEFAULT_NOTES_TITLE.to_string(),
            include_summary: true,
            include_key_terms: true,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            batch_size: DEFAULT_NOTES_BATCH_SIZE,
        }
    }
}

impl NotesParams {
    #[inline]
    pub fn validate(&self) -> Result<()> {
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

#[derive(Debug, Default, Deserialize)]
struct RawSection {
    title: Option<String>,
    content: Option<String>,
    #[serde(default)]
    subsections: Vec<Value>,
    #[serde(default)]
    key_terms: Vec<Value>,
    #[serde(default)]
    examples: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSubsection {
    subtitle: Option<String>,
    #[serde(default)]
    points: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawKeyTerm {
    term: Option<String>,
    definition: Option<String>,
}

fn strings_only(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => non_empty(Some(s)),
            _ => None,
        })
        .collect()
}

impl RawSection {
    fn validate(self) -> Option<NoteSection> {
        let title = non_empty(self.title)?;
        let content = non_empty(self.content).unwrap_or_default();

        let subsections: Vec<Subsection> = self
            .subsections
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawSubsection>(v).ok())
            .filter_map(|raw| {
                let subtitle = non_empty(raw.subtitle)?;
                let points = strings_only(raw.points);
                (!points.is_empty()).then_some(Subsection { subtitle, points })
            })
            .collect();

        let key_terms: Vec<KeyTerm> = self
            .key_terms
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawKeyTerm>(v).ok())
            .filter_map(|raw| {
                Some(KeyTerm {
                    term: non_empty(raw.term)?,
                    definition: non_empty(raw.definition)?,
                })
            })
            .collect();

        if content.is_empty() && subsections.is_empty() {
            return None;
        }

        Some(NoteSection {
            title,
            content,
            subsections,
            key_terms,
            examples: strings_only(self.examples),
        })
    }
}

/// Validated sections from one model response. Accepts either
/// `{"sections": [...]}` or a bare array of sections.
#[inline]
pub fn parse_sections(raw: &str) -> Result<Vec<NoteSection>> {
    let items = match parse_json_object(raw) {
        Ok(mut object) => match object.remove("sections") {
            Some(Value::Array(items)) => items,
            _ => parse_json_array(raw).map_err(|_| {
                RagError::Generation("Model response has no \"sections\" array".to_string())
            })?,
        },
        Err(object_error) => parse_json_array(raw).map_err(|_| object_error)?,
    };

    let total = items.len();
    let sections: Vec<NoteSection> = items
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawSection>(v).ok())
        .filter_map(RawSection::validate)
        .collect();

    debug!("Kept {} of {} note sections from model output", sections.len(), total);
    Ok(sections)
}

pub struct NotesGenerator {
    llm: Arc<dyn LanguageModel>,
}

impl NotesGenerator {
    #[inline]
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Generate notes section by section, one model call per batch of unique
    /// chunks, plus an optional summary call. Failed batches are skipped;
    /// notes with zero sections are an error.
    #[inline]
    pub async fn generate(&self, chunks: &[String], params: &NotesParams) -> Result<Notes> {
        params.validate()?;

        let content: Vec<String> = chunks
            .iter()
            .filter(|c| !c.trim().is_empty())
            .cloned()
            .collect();
        if content.is_empty() {
            return Err(RagError::NoContent(
                "No content available to generate notes. Upload a document or video first."
                    .to_string(),
            ));
        }

        let unique = dedupe(&content, params.similarity_threshold);
        let batches = batch_chunks(&unique, params.batch_size);
        info!(
            "Generating notes from {} unique chunks in {} batches",
            unique.len(),
            batches.len()
        );

        let mut sections = Vec::new();
        let mut last_error = None;
        let request_kind = detect_content_kind(&unique);
        let mut kind = ContentKind::Transcript;
        for (idx, batch) in batches.iter().enumerate() {
            let batch_kind = batch_content_kind(batch, request_kind);
            kind = kind.combine(batch_kind);
            let prompt = section_prompt(batch_kind, batch, params.include_key_terms);
            let result = match self.llm.complete(&prompt).await {
                Ok(raw) => parse_sections(&raw),
                Err(e) => Err(e),
            };
            match result {
                Ok(batch_sections) => {
                    debug!(
                        "Batch {}/{} produced {} sections",
                        idx + 1,
                        batches.len(),
                        batch_sections.len()
                    );
                    sections.extend(batch_sections);
                }
                Err(e) => {
                    warn!("Notes batch {}/{} failed: {}", idx + 1, batches.len(), e);
                    last_error = Some(e);
                }
            }
        }

        if sections.is_empty() {
            return Err(match last_error {
                Some(RagError::Provider(message)) => RagError::Provider(message),
                _ => RagError::Generation("Failed to generate any note sections".to_string()),
            });
        }

        if !params.include_key_terms {
            for section in &mut sections {
                section.key_terms.clear();
            }
        }

        let summary = if params.include_summary {
            self.summarize(kind, &unique).await
        } else {
            String::new()
        };

        info!("Generated notes with {} sections", sections.len());
        Ok(Notes {
            title: params.title.clone(),
            summary,
            metadata: NotesMetadata {
                total_sections: sections.len(),
                source_chunks: content.len(),
                unique_chunks: unique.len(),
                batches_processed: batches.len(),
                content_kind: kind,
                is_fallback: kind.is_fallback(),
                generated_at: Utc::now(),
            },
            sections,
        })
    }

    async fn summarize(&self, kind: ContentKind, unique: &[String]) -> String {
        let material: String = unique
            .join(SECTION_SEPARATOR)
            .chars()
            .take(SUMMARY_CONTEXT_CHARS)
            .collect();
        let focus = match kind {
            ContentKind::Transcript => "Summarize the study material below",
            ContentKind::Metadata => {
                "The material below describes a video by its metadata. Summarize the subjects it covers"
            }
            ContentKind::Fallback => {
                "No transcript is available for the source video. Summarize the key ideas of the \
                 educational topic the material below mentions"
            }
        };
        let prompt = format!(
            "{focus} in 3 to 5 sentences for a student preparing for an exam. \
             Respond with plain text only.\n\nMATERIAL:\n{material}"
        );

        match self.llm.complete(&prompt).await {
            Ok(raw) => strip_code_fences(&raw),
            Err(e) => {
                warn!("Summary generation failed, continuing without one: {}", e);
                String::new()
            }
        }
    }
}

fn section_prompt(kind: ContentKind, batch: &str, include_key_terms: bool) -> String {
    let preamble = match kind {
        ContentKind::Transcript => {
            "You are an expert educator turning study material into clear, well-organized notes. \
             Cover only what the material below says."
        }
        ContentKind::Metadata => {
            "You are an expert educator writing study notes. The material below describes a \
             video through its title, description and tags rather than a transcript. Write notes \
             on the subjects it covers using well-established knowledge of them."
        }
        ContentKind::Fallback => {
            "You are an expert educator writing study notes. No transcript is available for the \
             source video, so the material below only identifies its general subject. Write \
             notes on the core concepts of that subject."
        }
    };
    let key_terms = if include_key_terms {
        ",\n      \"key_terms\": [{\"term\": \"...\", \"definition\": \"...\"}]"
    } else {
        ""
    };

    format!(
        "{preamble}\n\n\
         Organize the notes into sections. Each section has a title, a short paragraph of \
         content, subsections with bullet points and, where useful, concrete examples.\n\n\
         Respond with JSON only, no other text:\n\
         {{\n  \"sections\": [\n    {{\n      \"title\": \"...\",\n      \"content\": \"...\",\n      \
         \"subsections\": [{{\"subtitle\": \"...\", \"points\": [\"...\"]}}],\n      \
         \"examples\": [\"...\"]{key_terms}\n    }}\n  ]\n}}\n\n\
         MATERIAL:\n{batch}"
    )
}
