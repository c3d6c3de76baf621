//! Configuration for archive-chat
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `ARCHIVE_CHAT__` (sections separated by
//! `__`, e.g. `ARCHIVE_CHAT__SEARCH__URL`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};
use crate::search::Operator;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "archive-chat.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub chat: ChatConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Search engine connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Engine base URL (e.g., "http://localhost:9200")
    pub url: String,
    /// Index holding the archived emails
    pub index: String,
    /// Basic auth user, only sent together with `password`
    pub username: Option<String>,
    pub password: Option<String>,
    /// Rows per page
    pub page_size: u64,
    /// Fields searched when the caller does not pick any
    pub default_fields: Vec<String>,
    pub default_operator: Operator,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// LLM chat endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Endpoint receiving `{question, context, history}`
    pub url: String,
    /// Answer with the offline mock instead of calling `url`
    pub mock: bool,
    pub timeout_seconds: u64,
}

/// Session/auth backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// Account flagged as administrator by `whoami`
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Where the login token is persisted between runs
    pub token_path: PathBuf,
    /// Token lifetime in hours
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Messages of the current session forwarded to the LLM
    pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Title given to the session created after a search with blank text
    pub untitled_search_title: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty", "compact" or "json"
    pub format: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "email_exchange".to_string(),
            username: None,
            password: None,
            page_size: 50,
            default_fields: vec!["subject".to_string(), "body".to_string()],
            default_operator: Operator::Or,
            timeout_seconds: 30,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000/api/chat".to_string(),
            mock: false,
            timeout_seconds: 120,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000".to_string(),
            admin_email: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from(".archive-chat/auth.json"),
            ttl_hours: 24,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { history_limit: 50 }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            untitled_search_title: "Untitled search".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// An explicit `path` must exist; without one, [`DEFAULT_CONFIG_FILE`] is
    /// read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("ARCHIVE_CHAT").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("search.url", &self.search.url),
            ("llm.url", &self.llm.url),
            ("backend.url", &self.backend.url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ArchiveError::Config(format!("Invalid {} '{}': {}", name, value, e)))?;
        }

        if self.search.page_size == 0 {
            return Err(ArchiveError::Config("search.page_size must be positive".to_string()));
        }

        if self.search.index.trim().is_empty() {
            return Err(ArchiveError::Config("search.index is empty".to_string()));
        }

        if self.auth.ttl_hours <= 0 {
            return Err(ArchiveError::Config("auth.ttl_hours must be positive".to_string()));
        }

        Ok(())
    }
}
