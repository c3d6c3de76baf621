//! HTTP chat endpoint
//!
//! Posts the question with its grounding context to a JSON endpoint and
//! reads the answer back.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatRequest, LlmEngine};
use crate::config::LlmConfig;
use crate::error::{ArchiveError, Result};

/// Shown when the endpoint answers without any text
pub const EMPTY_REPLY: &str = "No response received.";

/// Client for the chat endpoint
pub struct HttpChatLlm {
    url: String,
    client: reqwest::Client,
}

impl HttpChatLlm {
    pub fn new(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            url: config.url.clone(),
            client,
        }
    }
}

#[async_trait]
impl LlmEngine for HttpChatLlm {
    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        debug!(
            "Sending question to {} with {} results and {} history messages",
            self.url,
            request.context.as_ref().map_or(0, |c| c.search_results.len()),
            request.history.len()
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| ArchiveError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("LLM request failed with status {}", status);
            return Err(ArchiveError::Llm(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string()));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ArchiveError::Llm(format!("invalid response: {}", e)))?;

        Ok(extract_reply(&data))
    }

    fn model_name(&self) -> &str {
        &self.url
    }
}

/// First non-empty of `response`, `answer`, `message`
pub fn extract_reply(data: &Value) -> String {
    ["response", "answer", "message"]
        .iter()
        .filter_map(|key| data.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .unwrap_or(EMPTY_REPLY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_reply_field_order() {
        assert_eq!(extract_reply(&json!({ "response": "a", "answer": "b" })), "a");
        assert_eq!(extract_reply(&json!({ "response": "", "answer": "b" })), "b");
        assert_eq!(extract_reply(&json!({ "message": "c" })), "c");
        assert_eq!(extract_reply(&json!({ "other": "d" })), EMPTY_REPLY);
        assert_eq!(extract_reply(&json!({ "response": 42 })), EMPTY_REPLY);
    }
}
