//! Backend REST client
//!
//! Authentication, sessions and message persistence. Every request carries the
//! stored token; a 401 answer forgets it.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::auth::{AuthToken, TokenStore};
use crate::config::BackendConfig;
use crate::error::{ArchiveError, Result};
use crate::session::{ChatMessage, NewMessage, Session, SessionBackend};

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct TitleBody<'a> {
    title: &'a str,
}

/// The logged-in account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub email: String,
    pub is_admin: bool,
}

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    admin_email: Option<String>,
    store: TokenStore,
    token: RwLock<Option<AuthToken>>,
}

impl BackendClient {
    /// Client using the token found in `store`, if any
    pub fn new(config: &BackendConfig, store: TokenStore) -> Self {
        let token = store.load();
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            admin_email: config.admin_email.as_ref().map(|e| e.to_lowercase()),
            store,
            token: RwLock::new(token),
        }
    }

    pub async fn is_logged_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        self.authenticate("/auth/login", email, password).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<AuthToken> {
        self.authenticate("/auth/register", email, password).await
    }

    /// Drop the token locally; the backend keeps no logout state
    pub async fn logout(&self) -> Result<()> {
        *self.token.write().await = None;
        self.store.clear()
    }

    pub async fn current_user(&self) -> Result<CurrentUser> {
        #[derive(Deserialize)]
        struct Me {
            #[serde(default)]
            email: String,
        }

        let response = self.request(Method::GET, "/auth/me").await.send().await?;
        let me: Me = self.check(response).await?.json().await?;
        let email = me.email.to_lowercase();

        Ok(CurrentUser {
            is_admin: self.admin_email.as_deref() == Some(email.as_str()),
            email,
        })
    }

    async fn authenticate(&self, path: &str, email: &str, password: &str) -> Result<AuthToken> {
        let response = self
            .client
            .post(self.url(path))
            .json(&Credentials { email, password })
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(ArchiveError::Unauthorized("invalid email or password".to_string()))
            }
            StatusCode::CONFLICT => {
                return Err(ArchiveError::InvalidInput(format!("{} is already registered", email)))
            }
            _ => {}
        }

        let body: TokenResponse = self.check(response).await?.json().await?;
        let token = AuthToken::new(body.access_token, body.token_type).with_email(email);

        self.store.save(&token)?;
        *self.token.write().await = Some(token.clone());
        info!("Logged in as {}", email);
        Ok(token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token.read().await.as_ref() {
            Some(token) => builder.header(AUTHORIZATION, token.authorization_header()),
            None => builder,
        }
    }

    /// Map non-success statuses to errors; 401 also forgets the token
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("Backend rejected the token, logging out");
                *self.token.write().await = None;
                if let Err(e) = self.store.clear() {
                    warn!("Failed to remove token file: {}", e);
                }
                Err(ArchiveError::Unauthorized("session expired, please log in again".to_string()))
            }
            StatusCode::NOT_FOUND => Err(ArchiveError::NotFound(message)),
            _ => Err(ArchiveError::Backend {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[async_trait]
impl SessionBackend for BackendClient {
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let response = self.request(Method::GET, "/sessions").await.send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn create_session(&self, title: &str) -> Result<Session> {
        let response = self
            .request(Method::POST, "/sessions")
            .await
            .json(&TitleBody { title })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn rename_session(&self, id: &str, title: &str) -> Result<Session> {
        let response = self
            .request(Method::PATCH, &format!("/sessions/{}", id))
            .await
            .json(&TitleBody { title })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/sessions/{}", id))
            .await
            .send()
            .await?;

        match self.check(response).await {
            Ok(_) => Ok(()),
            Err(ArchiveError::NotFound(_)) => Err(ArchiveError::NotFound(format!(
                "session {} not found or already deleted",
                id
            ))),
            Err(e) => Err(e),
        }
    }

    async fn list_messages(&self, id: &str) -> Result<Vec<ChatMessage>> {
        let response = self
            .request(Method::GET, &format!("/sessions/{}/messages", id))
            .await
            .send()
            .await?;

        match self.check(response).await {
            Ok(response) => Ok(response.json().await?),
            Err(ArchiveError::NotFound(_)) => {
                debug!("Messages endpoint missing for session {}", id);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn has_messages(&self, id: &str) -> Result<bool> {
        let response = self
            .request(Method::GET, &format!("/sessions/{}/messages", id))
            .await
            .query(&[("limit", 1)])
            .send()
            .await?;

        let messages: Vec<ChatMessage> = self.check(response).await?.json().await?;
        Ok(!messages.is_empty())
    }

    async fn save_message(&self, id: &str, message: &NewMessage) -> Result<Option<ChatMessage>> {
        let response = self
            .request(Method::POST, &format!("/sessions/{}/messages", id))
            .await
            .json(message)
            .send()
            .await?;

        match self.check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(ArchiveError::NotFound(_)) => {
                warn!("Messages endpoint not available, message kept locally");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
