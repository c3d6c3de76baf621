//! Session manager
//!
//! Keeps the session list, the selected session and cached messages in step
//! with the backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{ChatMessage, NewMessage, Session};
use super::{SessionBackend, SessionHook};
use crate::error::{ArchiveError, Result};
use crate::llm::MessageRole;

/// Client-side view of the user's sessions
#[derive(Debug, Clone, Default)]
pub struct SessionBook {
    sessions: Vec<Session>,
    current: Option<String>,
    messages: HashMap<String, Vec<ChatMessage>>,
}

impl SessionBook {
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&Session> {
        let id = self.current.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Cached messages of a session, oldest first
    pub fn messages(&self, id: &str) -> &[ChatMessage] {
        self.messages.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a session by 1-based position in the list or by id
    pub fn resolve(&self, selector: &str) -> Option<&Session> {
        let selector = selector.trim();
        if let Ok(position) = selector.parse::<usize>() {
            if let Some(session) = position.checked_sub(1).and_then(|i| self.sessions.get(i)) {
                return Some(session);
            }
        }
        self.sessions.iter().find(|s| s.id == selector)
    }

    fn set_sessions(&mut self, sessions: Vec<Session>) {
        if let Some(current) = &self.current {
            if !sessions.iter().any(|s| &s.id == current) {
                self.current = None;
            }
        }
        self.sessions = sessions;
    }

    fn insert_front(&mut self, session: Session) {
        self.sessions.retain(|s| s.id != session.id);
        self.sessions.insert(0, session);
    }

    fn replace(&mut self, session: Session) {
        if let Some(slot) = self.sessions.iter_mut().find(|s| s.id == session.id) {
            *slot = session;
        }
    }

    fn remove(&mut self, id: &str) {
        self.sessions.retain(|s| s.id != id);
        self.messages.remove(id);
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
    }
}

/// Session manager
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
    book: RwLock<SessionBook>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            book: RwLock::new(SessionBook::default()),
        }
    }

    pub async fn snapshot(&self) -> SessionBook {
        self.book.read().await.clone()
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.book.read().await.sessions().to_vec()
    }

    pub async fn current(&self) -> Option<Session> {
        self.book.read().await.current().cloned()
    }

    pub async fn resolve(&self, selector: &str) -> Option<Session> {
        self.book.read().await.resolve(selector).cloned()
    }

    pub async fn messages(&self, id: &str) -> Vec<ChatMessage> {
        self.book.read().await.messages(id).to_vec()
    }

    /// Reload the session list; selects the first session when none is selected
    pub async fn refresh(&self) -> Result<Vec<Session>> {
        let sessions = self.backend.list_sessions().await?;
        debug!("Loaded {} sessions", sessions.len());

        let first = {
            let mut book = self.book.write().await;
            book.set_sessions(sessions.clone());
            if book.current.is_none() {
                sessions.first().map(|s| s.id.clone())
            } else {
                None
            }
        };

        if let Some(id) = first {
            self.select(&id).await?;
        }

        Ok(sessions)
    }

    /// Make `id` the current session and load its messages
    pub async fn select(&self, id: &str) -> Result<Vec<ChatMessage>> {
        self.book.write().await.current = Some(id.to_string());

        let messages = self.backend.list_messages(id).await?;
        debug!("Session {} has {} messages", id, messages.len());

        self.book
            .write()
            .await
            .messages
            .insert(id.to_string(), messages.clone());
        Ok(messages)
    }

    /// Create a session with a user-supplied title and select it
    pub async fn create(&self, title: &str) -> Result<Session> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ArchiveError::InvalidInput("Session title is empty".to_string()));
        }

        let session = self.backend.create_session(title).await?;
        info!("Created session {} ({})", session.id, session.display_title());

        self.refresh().await?;
        self.select(&session.id).await?;
        Ok(session)
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<Session> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ArchiveError::InvalidInput("Session title is empty".to_string()));
        }

        let session = self.backend.rename_session(id, title).await?;
        self.book.write().await.replace(session.clone());
        Ok(session)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.backend.delete_session(id).await?;
        info!("Deleted session {}", id);

        self.book.write().await.remove(id);
        self.refresh().await?;
        Ok(())
    }

    /// Persist a message and append it to the session's history.
    ///
    /// The message is cached even when the backend fails to store it, so the
    /// conversation history stays complete for the rest of the run.
    pub async fn record_message(&self, id: &str, role: MessageRole, content: &str) -> Result<ChatMessage> {
        let request = NewMessage {
            content: content.to_string(),
            role,
        };

        let result = self.backend.save_message(id, &request).await;
        let message = match &result {
            Ok(Some(saved)) => saved.clone(),
            Ok(None) | Err(_) => ChatMessage::local(role, content),
        };

        self.book
            .write()
            .await
            .messages
            .entry(id.to_string())
            .or_default()
            .push(message.clone());

        result.map(|_| message)
    }

    /// Delete sessions that hold no messages; returns how many were removed.
    ///
    /// Sessions whose messages cannot be checked are left alone.
    pub async fn cleanup_empty_sessions(&self) -> usize {
        let book = self.snapshot().await;
        let mut removed = 0;

        for session in book.sessions() {
            if !book.messages(&session.id).is_empty() {
                continue;
            }

            let has_messages = match self.backend.has_messages(&session.id).await {
                Ok(has_messages) => has_messages,
                Err(e) => {
                    warn!("Could not check messages of session {}: {}", session.id, e);
                    continue;
                }
            };
            if has_messages {
                continue;
            }

            match self.backend.delete_session(&session.id).await {
                Ok(()) => {
                    info!("Deleted empty session {}", session.id);
                    self.book.write().await.remove(&session.id);
                    removed += 1;
                }
                Err(e) => warn!("Error deleting empty session {}: {}", session.id, e),
            }
        }

        removed
    }
}

#[async_trait]
impl SessionHook for SessionManager {
    async fn create_and_select_session(&self, title: &str) -> Result<Session> {
        let session = self.backend.create_session(title).await?;
        info!("Opened session {} for search '{}'", session.id, title);

        self.book.write().await.insert_front(session.clone());
        self.select(&session.id).await?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockSessionBackend;

    fn session(id: &str, title: &str) -> Session {
        Session {
            id: id.to_string(),
            title: Some(title.to_string()),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_refresh_selects_first_session() {
        let mut backend = MockSessionBackend::new();
        backend
            .expect_list_sessions()
            .returning(|| Ok(vec![session("1", "First"), session("2", "Second")]));
        backend
            .expect_list_messages()
            .withf(|id| id == "1")
            .times(1)
            .returning(|_| Ok(vec![ChatMessage::local(MessageRole::User, "hello")]));

        let manager = SessionManager::new(Arc::new(backend));
        let sessions = manager.refresh().await.unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(manager.current().await.unwrap().id, "1");
        assert_eq!(manager.messages("1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let manager = SessionManager::new(Arc::new(MockSessionBackend::new()));
        let result = manager.create("   ").await;
        assert!(matches!(result, Err(ArchiveError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_hook_prepends_and_selects() {
        let mut backend = MockSessionBackend::new();
        backend
            .expect_create_session()
            .withf(|title| title == "budget")
            .returning(|title| Ok(session("9", title)));
        backend.expect_list_messages().returning(|_| Ok(Vec::new()));

        let manager = SessionManager::new(Arc::new(backend));
        let created = manager.create_and_select_session("budget").await.unwrap();

        assert_eq!(created.id, "9");
        assert_eq!(manager.sessions().await[0].id, "9");
        assert_eq!(manager.current().await.unwrap().display_title(), "budget");
    }

    #[tokio::test]
    async fn test_record_message_caches_on_backend_failure() {
        let mut backend = MockSessionBackend::new();
        backend
            .expect_save_message()
            .returning(|_, _| Err(ArchiveError::Backend { status: 500, message: "down".to_string() }));

        let manager = SessionManager::new(Arc::new(backend));
        let result = manager.record_message("1", MessageRole::User, "question").await;

        assert!(result.is_err());
        let cached = manager.messages("1").await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].content, "question");
    }

    #[tokio::test]
    async fn test_cleanup_deletes_only_empty_sessions() {
        let mut backend = MockSessionBackend::new();
        backend.expect_list_sessions().times(1).returning(|| {
            Ok(vec![
                session("1", "Busy"),
                session("2", "Empty"),
                session("3", "No messages endpoint"),
                session("4", "Unreachable"),
            ])
        });
        backend
            .expect_list_messages()
            .withf(|id| id == "1")
            .returning(|_| Ok(vec![ChatMessage::local(MessageRole::User, "hi")]));
        backend
            .expect_has_messages()
            .withf(|id| id == "2")
            .returning(|_| Ok(false));
        backend
            .expect_has_messages()
            .withf(|id| id == "3")
            .returning(|_| Err(ArchiveError::NotFound("no messages endpoint".to_string())));
        backend
            .expect_has_messages()
            .withf(|id| id == "4")
            .returning(|_| Err(ArchiveError::Backend { status: 502, message: "bad gateway".to_string() }));
        backend
            .expect_delete_session()
            .withf(|id| id == "2")
            .times(1)
            .returning(|_| Ok(()));

        let manager = SessionManager::new(Arc::new(backend));
        manager.refresh().await.unwrap();

        let removed = manager.cleanup_empty_sessions().await;
        assert_eq!(removed, 1);

        let ids: Vec<String> = manager.sessions().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_sessions_with_unsaved_local_messages() {
        let mut backend = MockSessionBackend::new();
        backend
            .expect_list_sessions()
            .returning(|| Ok(vec![session("1", "Offline")]));
        backend.expect_list_messages().returning(|_| Ok(Vec::new()));
        backend.expect_save_message().returning(|_, _| Ok(None));
        backend.expect_has_messages().never();
        backend.expect_delete_session().never();

        let manager = SessionManager::new(Arc::new(backend));
        manager.refresh().await.unwrap();
        manager
            .record_message("1", MessageRole::User, "kept locally")
            .await
            .unwrap();

        assert_eq!(manager.cleanup_empty_sessions().await, 0);
        assert_eq!(manager.sessions().await.len(), 1);
    }

    #[test]
    fn test_resolve_by_position_or_id() {
        let mut book = SessionBook::default();
        book.set_sessions(vec![session("abc", "A"), session("def", "B")]);

        assert_eq!(book.resolve("2").unwrap().id, "def");
        assert_eq!(book.resolve("abc").unwrap().id, "abc");
        assert!(book.resolve("0").is_none());
        assert!(book.resolve("zzz").is_none());
    }
}
