//! LLM Engine abstraction

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::search::{ResultRow, SearchParams};

pub mod http;
pub mod mock;

pub use http::HttpChatLlm;
pub use mock::MockLlm;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

// Anything that is not "assistant" is shown as the user's side
impl<'de> Deserialize<'de> for MessageRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let role = String::deserialize(deserializer)?;
        Ok(if role.eq_ignore_ascii_case("assistant") {
            MessageRole::Assistant
        } else {
            MessageRole::User
        })
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Search state the answer is grounded in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    pub search_results: Vec<ResultRow>,
    pub search_params: Option<SearchParams>,
}

/// Request sent to the chat endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub question: String,
    /// `null` when no results are loaded
    pub context: Option<ChatContext>,
    /// Earlier messages of the session, oldest first
    pub history: Vec<Message>,
}

/// LLM Engine trait
#[async_trait]
pub trait LlmEngine: Send + Sync {
    /// Answer the question of `request`
    async fn generate(&self, request: &ChatRequest) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}
