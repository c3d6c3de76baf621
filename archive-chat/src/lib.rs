//! archive-chat: search an email archive and chat about the results
//!
//! Searches go to an Elasticsearch-compatible engine; results are paginated
//! and sortable in place; an LLM answers questions grounded in the shown
//! results. Conversations are kept in sessions stored by a backend service.
//!
//! # Example
//!
//! ```no_run
//! use archive_chat::config::Config;
//! use archive_chat::search::{ElasticGateway, SearchParams};
//! use archive_chat::view::{ResultsViewModel, TerminalRenderer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let gateway = Arc::new(ElasticGateway::new(&config.search));
//!
//!     let mut view = ResultsViewModel::new(
//!         gateway,
//!         Box::new(TerminalRenderer::stdout()),
//!         config.search.page_size,
//!     );
//!     view.new_search(SearchParams::new("quarterly budget")).await?;
//!     view.next_page().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`search`]: query construction and the search engine gateway
//! - [`view`]: results state, view model and renderers
//! - [`session`]: chat sessions and their messages
//! - [`chat`]: grounded questions to the LLM
//! - [`backend`]: REST client for auth and sessions
//! - [`console`]: interactive shell

pub mod auth;
pub mod backend;
pub mod chat;
pub mod config;
pub mod console;
pub mod error;
pub mod llm;
pub mod search;
pub mod session;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use error::{ArchiveError, QueryError, Result};
