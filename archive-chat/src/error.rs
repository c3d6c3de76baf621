//! Error types for archive-chat

use thiserror::Error;

/// Result type alias for archive-chat operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// A search request that did not produce a page of results.
///
/// Carries the HTTP status when the engine answered, `None` when the request
/// never got a response (connection refused, timeout, undecodable body).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct QueryError {
    pub status: Option<u16>,
    pub message: String,
}

impl QueryError {
    /// The engine answered with a non-success status
    pub fn status(code: u16, reason: Option<&str>) -> Self {
        Self {
            status: Some(code),
            message: format!(
                "HTTP {} {}",
                code,
                reason.unwrap_or("")
            )
            .trim_end()
            .to_string(),
        }
    }

    /// The request failed before a status was received
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Search failed: {0}")]
    Query(#[from] QueryError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No session selected")]
    NoSessionSelected,

    #[error("LLM request failed: {0}")]
    Llm(String),
}

impl From<config::ConfigError> for ArchiveError {
    fn from(err: config::ConfigError) -> Self {
        ArchiveError::Config(err.to_string())
    }
}
