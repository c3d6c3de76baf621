//! Login token persistence
//!
//! The backend hands out a bearer token at login. It is stored as JSON on disk
//! together with the time it was issued and treated as expired once the
//! configured lifetime has passed.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Issue time, Unix milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub email: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthToken {
    /// Token issued now
    pub fn new(token: impl Into<String>, token_type: Option<String>) -> Self {
        Self {
            token: token.into(),
            token_type: token_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(default_token_type),
            timestamp: Utc::now().timestamp_millis(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis(), ttl)
    }

    pub fn is_expired_at(&self, now_millis: i64, ttl: Duration) -> bool {
        now_millis - self.timestamp > ttl.num_milliseconds()
    }

    /// `Authorization` header value, e.g. `Bearer abc`
    pub fn authorization_header(&self) -> String {
        let kind = self.token_type.trim();
        let mut chars = kind.chars();
        let kind = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => "Bearer".to_string(),
        };
        format!("{} {}", kind, self.token)
    }
}

/// Token file on disk
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    ttl: Duration,
}

impl TokenStore {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            path: config.token_path.clone(),
            ttl: Duration::hours(config.ttl_hours),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored token, if present, readable and not expired
    pub fn load(&self) -> Option<AuthToken> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No token at {}: {}", self.path.display(), e);
                return None;
            }
        };

        let token: AuthToken = match serde_json::from_str(&content) {
            Ok(token) => token,
            Err(e) => {
                warn!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        if token.is_expired(self.ttl) {
            debug!("Stored token expired");
            return None;
        }

        Some(token)
    }

    pub fn save(&self, token: &AuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(token)?)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
