//! archive-chat: email archive search and chat client
//!
//! # Usage
//!
//! ```bash
//! # Log in against the backend (token is stored locally)
//! archive-chat login --email me@example.com --password secret
//!
//! # One-shot search, third page
//! archive-chat search quarterly budget --field subject --page 3
//!
//! # Interactive shell (default)
//! archive-chat
//! ```

use anyhow::Context;
use archive_chat::auth::TokenStore;
use archive_chat::backend::BackendClient;
use archive_chat::chat::ChatService;
use archive_chat::config::{Config, LoggingConfig};
use archive_chat::console::{format_sessions, Console, SearchArgs};
use archive_chat::llm::{HttpChatLlm, LlmEngine, MockLlm};
use archive_chat::search::{ElasticGateway, SearchGateway};
use archive_chat::session::SessionManager;
use archive_chat::view::{ResultsViewModel, TerminalRenderer};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "archive-chat")]
#[command(about = "Search an email archive and chat about the results", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./archive-chat.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and store the token
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Remove empty sessions and forget the token
    Logout,
    /// Show the logged-in account
    Whoami,
    /// Run one search and print a page of results
    Search {
        #[command(flatten)]
        args: SearchArgs,
        /// Page to show (1-based)
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// List chat sessions
    Sessions,
    /// Interactive shell
    Shell,
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("archive_chat={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => registry.with(fmt::layer().json().with_writer(std::io::stderr)).init(),
        "compact" => registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init(),
        _ => registry.with(fmt::layer().pretty().with_writer(std::io::stderr)).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging);

    info!("Starting archive-chat v{}", env!("CARGO_PKG_VERSION"));

    let backend = Arc::new(BackendClient::new(&config.backend, TokenStore::new(&config.auth)));
    let sessions = Arc::new(SessionManager::new(backend.clone()));

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Login { email, password } => {
            backend.login(&email, &password).await?;
            println!("✓ Logged in as {}", email);
        }
        Commands::Register { email, password } => {
            backend.register(&email, &password).await?;
            println!("✓ Registered and logged in as {}", email);
        }
        Commands::Logout => {
            if backend.is_logged_in().await {
                match sessions.refresh().await {
                    Ok(_) => {
                        let removed = sessions.cleanup_empty_sessions().await;
                        info!("Removed {} empty sessions before logout", removed);
                    }
                    Err(e) => warn!("Skipping empty-session cleanup: {}", e),
                }
            }
            backend.logout().await?;
            println!("✓ Logged out");
        }
        Commands::Whoami => {
            let user = backend.current_user().await?;
            let role = if user.is_admin { " (admin)" } else { "" };
            println!("{}{}", user.email, role);
        }
        Commands::Search { args, page } => {
            let gateway: Arc<dyn SearchGateway> = Arc::new(ElasticGateway::new(&config.search));
            let mut view = ResultsViewModel::new(
                gateway.clone(),
                Box::new(TerminalRenderer::stdout()),
                config.search.page_size,
            );

            let request = view.begin_request(args.to_params(&config.search), page.max(1));
            let result = gateway.search(&request.params, request.page).await;
            view.complete(request, result)?;
        }
        Commands::Sessions => {
            sessions.refresh().await?;
            for line in format_sessions(&sessions.snapshot().await) {
                println!("{}", line);
            }
        }
        Commands::Shell => {
            if !backend.is_logged_in().await {
                warn!("Not logged in, sessions and chat history are unavailable");
                println!("Not logged in. Run `archive-chat login` to keep chat sessions.");
            }

            let llm: Arc<dyn LlmEngine> = if config.llm.mock {
                info!("Using mock LLM");
                Arc::new(MockLlm::new())
            } else {
                Arc::new(HttpChatLlm::new(&config.llm))
            };

            let view = ResultsViewModel::new(
                Arc::new(ElasticGateway::new(&config.search)),
                Box::new(TerminalRenderer::stdout()),
                config.search.page_size,
            )
            .with_session_hook(sessions.clone(), config.session.untitled_search_title.clone());

            let chat = ChatService::new(llm, sessions.clone(), config.chat.history_limit);
            let mut console = Console::new(view, sessions, chat, config.search.clone());
            console.run().await?;
        }
    }

    Ok(())
}
