use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::LanguageModel;
use crate::embeddings::EmbeddingProvider;
use crate::{RagError, Result};

/// Language model that replays canned responses and records prompts
#[derive(Debug, Default)]
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub(crate) fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying(responses: &[&str]) -> Self {
        Self::new(responses.iter().map(|r| Ok((*r).to_string())).collect())
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt lock").clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompt lock")
            .push(prompt.to_string());
        self.responses
            .lock()
            .expect("response lock")
            .pop_front()
            .unwrap_or_else(|| Err(RagError::Provider("no scripted response left".to_string())))
    }
}

/// Embeds text as letter-frequency vectors over a-z
#[derive(Debug, Default)]
pub(crate) struct LetterEmbedder;

pub(crate) fn letter_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; 26];
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() {
            vector[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }
}

pub(crate) fn question_json(question: &str, answer: &str, difficulty: &str) -> String {
    format!(
        r#"{{"question": "{question}", "options": ["{answer}", "wrong one", "wrong two", "wrong three"], "answer": "{answer}", "difficulty": "{difficulty}", "explanation": "because"}}"#
    )
}

pub(crate) fn question_array(count: usize, prefix: &str, difficulty: &str) -> String {
    let items: Vec<String> = (0..count)
        .map(|i| question_json(&format!("{prefix} question {i}?"), &format!("answer {i}"), difficulty))
        .collect();
    format!("[{}]", items.join(", "))
}
