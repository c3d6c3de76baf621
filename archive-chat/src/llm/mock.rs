//! Mock LLM for testing and offline use
//!
//! Answers from the grounding context alone: it reports how many results are
//! loaded and lists the ones whose subject or body mention words of the
//! question.

use async_trait::async_trait;
use tracing::debug;

use super::{ChatRequest, LlmEngine};
use crate::error::Result;
use crate::search::ResultRow;

const MAX_LISTED: usize = 3;

/// Mock LLM implementation
pub struct MockLlm {
    model_name: String,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            model_name: "mock-llm-v1".to_string(),
        }
    }

    fn keywords(question: &str) -> Vec<String> {
        question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| word.chars().count() > 3)
            .map(str::to_lowercase)
            .collect()
    }

    fn mentions(row: &ResultRow, keywords: &[String]) -> bool {
        let subject = row.subject.to_lowercase();
        let body = row.body.to_lowercase();
        keywords
            .iter()
            .any(|word| subject.contains(word.as_str()) || body.contains(word.as_str()))
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmEngine for MockLlm {
    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        debug!("MockLLM: answering '{}'", request.question);

        let Some(context) = &request.context else {
            return Ok("No search results are loaded. Run a search first so I can answer from your archive.".to_string());
        };

        let keywords = Self::keywords(&request.question);
        let matching: Vec<&ResultRow> = context
            .search_results
            .iter()
            .filter(|row| Self::mentions(row, &keywords))
            .collect();

        let mut answer = format!(
            "{} results are loaded; {} mention your question.",
            context.search_results.len(),
            matching.len()
        );

        for row in matching.iter().take(MAX_LISTED) {
            let subject = if row.subject.is_empty() { "(no subject)" } else { row.subject.as_str() };
            answer.push_str(&format!("\n- {} ({})", subject, row.sender));
        }

        Ok(answer)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
