//! Grounded chat
//!
//! Questions are answered by the LLM with the loaded search results, the
//! search parameters and the tail of the session's conversation as context.
//! Both sides of the exchange are persisted to the current session.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};
use crate::llm::{ChatContext, ChatRequest, LlmEngine, Message, MessageRole};
use crate::session::{ChatMessage, SessionManager};
use crate::view::ResultsState;

/// Answer to one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
    /// The LLM call failed and `content` is the apology shown instead
    pub failed: bool,
}

pub struct ChatService {
    llm: Arc<dyn LlmEngine>,
    sessions: Arc<SessionManager>,
    history_limit: usize,
}

impl ChatService {
    pub fn new(llm: Arc<dyn LlmEngine>, sessions: Arc<SessionManager>, history_limit: usize) -> Self {
        Self {
            llm,
            sessions,
            history_limit,
        }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Ask about the results held in `results` within the current session
    pub async fn ask(&self, question: &str, results: &ResultsState) -> Result<ChatReply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ArchiveError::InvalidInput("Question is empty".to_string()));
        }

        let session = self
            .sessions
            .current()
            .await
            .ok_or(ArchiveError::NoSessionSelected)?;

        let history = self.sessions.messages(&session.id).await;
        let request = build_request(question, results, &history, self.history_limit);
        debug!(
            "Asking {} with {} history messages, context: {}",
            self.llm.model_name(),
            request.history.len(),
            request.context.is_some()
        );

        if let Err(e) = self
            .sessions
            .record_message(&session.id, MessageRole::User, question)
            .await
        {
            warn!("Failed to save question to session {}: {}", session.id, e);
        }

        let reply = match self.llm.generate(&request).await {
            Ok(content) => ChatReply {
                content,
                failed: false,
            },
            Err(e) => {
                warn!("LLM request failed: {}", e);
                ChatReply {
                    content: format!("Sorry, an error occurred: {}", e),
                    failed: true,
                }
            }
        };

        if let Err(e) = self
            .sessions
            .record_message(&session.id, MessageRole::Assistant, &reply.content)
            .await
        {
            warn!("Failed to save answer to session {}: {}", session.id, e);
        }

        info!("Answered question in session {}", session.id);
        Ok(reply)
    }
}

/// Chat request for `question`.
///
/// `context` is `None` when no results are held. History keeps the last
/// `history_limit` messages, oldest first.
pub fn build_request(
    question: &str,
    results: &ResultsState,
    history: &[ChatMessage],
    history_limit: usize,
) -> ChatRequest {
    let context = if results.raw_rows().is_empty() {
        None
    } else {
        Some(ChatContext {
            search_results: results.display_rows(),
            search_params: results.params().cloned(),
        })
    };

    let skip = history.len().saturating_sub(history_limit);
    let history: Vec<Message> = history.iter().skip(skip).map(ChatMessage::to_message).collect();

    ChatRequest {
        question: question.to_string(),
        context,
        history,
    }
}
