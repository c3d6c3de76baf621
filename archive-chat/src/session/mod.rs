//! Chat sessions
//!
//! Sessions and their messages live in the backend; this module keeps the
//! client-side view of them (the list, the selected session, a message cache)
//! and talks to the backend through [`SessionBackend`].

use async_trait::async_trait;

use crate::error::Result;

pub mod manager;
pub mod types;

pub use manager::{SessionBook, SessionManager};
pub use types::*;

/// Session and message persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    async fn create_session(&self, title: &str) -> Result<Session>;

    async fn rename_session(&self, id: &str, title: &str) -> Result<Session>;

    async fn delete_session(&self, id: &str) -> Result<()>;

    /// Messages of a session, oldest first; a missing endpoint yields none
    async fn list_messages(&self, id: &str) -> Result<Vec<ChatMessage>>;

    /// Whether the session holds at least one message.
    ///
    /// Unlike [`list_messages`](Self::list_messages), a session whose
    /// messages cannot be looked up is an error, never `false`.
    async fn has_messages(&self, id: &str) -> Result<bool>;

    /// `None` when the backend does not persist messages
    async fn save_message(&self, id: &str, message: &NewMessage) -> Result<Option<ChatMessage>>;
}

/// Opens a session for a search that just completed
#[async_trait]
pub trait SessionHook: Send + Sync {
    async fn create_and_select_session(&self, title: &str) -> Result<Session>;
}
