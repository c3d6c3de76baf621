//! Interactive console
//!
//! Line-oriented shell over the results view, the session list and the chat.
//! Commands have the format `command arguments`, e.g. `sort date` or
//! `search "quarterly budget" --field subject --from 2024-01-01`. Search
//! arguments are split with shell quoting rules.

use clap::{Args, Parser};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::chat::ChatService;
use crate::config::SearchConfig;
use crate::error::{ArchiveError, QueryError, Result};
use crate::llm::MessageRole;
use crate::search::{Operator, SearchParams, SortKey};
use crate::session::{ChatMessage, Session, SessionBook, SessionManager};
use crate::view::{PageOutcome, ResultsViewModel};

/// Search options shared by the `search` subcommand and the shell command
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct SearchArgs {
    /// Free text; omit to list the whole archive
    pub text: Vec<String>,

    /// Field to search in (repeatable); defaults to the configured fields
    #[arg(short = 'f', long = "field")]
    pub fields: Vec<String>,

    /// How terms combine: and | or
    #[arg(short = 'o', long)]
    pub operator: Option<Operator>,

    /// Earliest date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Latest date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,
}

impl SearchArgs {
    /// Search parameters, falling back to the configured defaults
    pub fn to_params(&self, defaults: &SearchConfig) -> SearchParams {
        SearchParams::new(self.text.join(" "))
            .with_fields(defaults.default_fields.iter().cloned())
            .with_fields(self.fields.iter().cloned())
            .with_operator(self.operator.unwrap_or(defaults.default_operator))
            .with_date_from(self.from.clone())
            .with_date_to(self.to.clone())
    }
}

#[derive(Debug, Parser)]
#[command(name = "search", disable_help_flag = true)]
struct SearchLine {
    #[command(flatten)]
    args: SearchArgs,
}

/// Shell command parsed from one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line
    Empty,
    Search(SearchArgs),
    Next,
    Prev,
    Sort(SortKey),
    Ask(String),
    Sessions,
    New(String),
    Use(String),
    Rename { selector: String, title: String },
    Delete(String),
    History,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "" => Command::Empty,
            "search" | "s" => {
                let words = shell_words::split(rest)
                    .map_err(|e| ArchiveError::InvalidInput(format!("search: {}", e)))?;
                let tokens = std::iter::once("search".to_string()).chain(words);
                let parsed = SearchLine::try_parse_from(tokens)
                    .map_err(|e| ArchiveError::InvalidInput(e.to_string().trim().to_string()))?;
                Command::Search(parsed.args)
            }
            "next" | "n" => Command::Next,
            "prev" | "p" => Command::Prev,
            "sort" => Command::Sort(required(rest, "sort requires a column")?.parse()?),
            "ask" | "?" => Command::Ask(required(rest, "ask requires a question")?.to_string()),
            "sessions" | "ls" => Command::Sessions,
            "new" => Command::New(required(rest, "new requires a title")?.to_string()),
            "use" => Command::Use(required(rest, "use requires a session number or id")?.to_string()),
            "rename" => {
                let (selector, title) = rest
                    .split_once(char::is_whitespace)
                    .map(|(selector, title)| (selector, title.trim()))
                    .filter(|(_, title)| !title.is_empty())
                    .ok_or_else(|| {
                        ArchiveError::InvalidInput("rename requires a session and a title".to_string())
                    })?;
                Command::Rename {
                    selector: selector.to_string(),
                    title: title.to_string(),
                }
            }
            "delete" | "rm" => Command::Delete(required(rest, "delete requires a session number or id")?.to_string()),
            "history" => Command::History,
            "help" | "h" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => {
                return Err(ArchiveError::InvalidInput(format!(
                    "unknown command '{}', type 'help' for a list",
                    other
                )))
            }
        };

        Ok(command)
    }
}

fn required<'a>(rest: &'a str, message: &str) -> Result<&'a str> {
    if rest.is_empty() {
        Err(ArchiveError::InvalidInput(message.to_string()))
    } else {
        Ok(rest)
    }
}

pub const HELP: &str = "\
Commands:
  search [TEXT] [--field F]... [--operator and|or] [--from DATE] [--to DATE]
                              quote phrases: search \"quarterly budget\"
  next | prev                 move through result pages
  sort <subject|body|sender|date>
                              sort the shown page; repeat to flip direction
  ask <QUESTION>              ask about the shown results
  sessions                    list chat sessions
  new <TITLE>                 start a session
  use <N|ID>                  switch session
  rename <N|ID> <TITLE>       rename a session
  delete <N|ID>               delete a session
  history                     show the current session's messages
  help                        this text
  quit                        leave (empty sessions are removed)";

/// Session list lines; the current session is marked with `*`
pub fn format_sessions(book: &SessionBook) -> Vec<String> {
    if book.sessions().is_empty() {
        return vec!["No sessions yet.".to_string()];
    }

    book.sessions()
        .iter()
        .enumerate()
        .map(|(i, session)| {
            let marker = if book.current_id() == Some(session.id.as_str()) { '*' } else { ' ' };
            format!("{} {:>2}. {} [{}]", marker, i + 1, session.display_title(), session.id)
        })
        .collect()
}

pub fn format_message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        MessageRole::User => "you",
        MessageRole::Assistant => "assistant",
    };
    format!("{}: {}", speaker, message.content)
}

/// Whether the shell keeps reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    view: ResultsViewModel,
    sessions: Arc<SessionManager>,
    chat: ChatService,
    search_defaults: SearchConfig,
}

impl Console {
    pub fn new(
        view: ResultsViewModel,
        sessions: Arc<SessionManager>,
        chat: ChatService,
        search_defaults: SearchConfig,
    ) -> Self {
        Self {
            view,
            sessions,
            chat,
            search_defaults,
        }
    }

    /// Read commands from stdin until `quit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        if let Err(e) = self.sessions.refresh().await {
            warn!("Could not load sessions: {}", e);
            println!("error: {}", e);
        }

        println!("archive-chat ({}). Type 'help' for commands.", self.chat.model_name());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    println!("error: {}", e);
                    continue;
                }
            };
            debug!("Command: {:?}", command);

            match self.execute(command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => println!("error: {}", e),
            }
        }

        self.shutdown().await;
        Ok(())
    }

    pub async fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Empty => {}
            Command::Search(args) => {
                let params = args.to_params(&self.search_defaults);
                if let Err(e) = self.view.new_search(params).await {
                    debug!("Search not loaded: {}", e);
                }
            }
            Command::Next => {
                let outcome = self.view.next_page().await;
                self.report_unchanged(outcome, "Already on the last page.");
            }
            Command::Prev => {
                let outcome = self.view.previous_page().await;
                self.report_unchanged(outcome, "Already on the first page.");
            }
            Command::Sort(key) => self.view.toggle_sort(key),
            Command::Ask(question) => {
                let reply = self.chat.ask(&question, self.view.state()).await?;
                println!("assistant: {}", reply.content);
            }
            Command::Sessions => {
                self.sessions.refresh().await?;
                self.print_sessions().await;
            }
            Command::New(title) => {
                let session = self.sessions.create(&title).await?;
                println!("Started session '{}'.", session.display_title());
            }
            Command::Use(selector) => {
                let session = self.find_session(&selector).await?;
                let messages = self.sessions.select(&session.id).await?;
                println!(
                    "Switched to '{}' ({} messages).",
                    session.display_title(),
                    messages.len()
                );
            }
            Command::Rename { selector, title } => {
                let session = self.find_session(&selector).await?;
                let session = self.sessions.rename(&session.id, &title).await?;
                println!("Renamed to '{}'.", session.display_title());
            }
            Command::Delete(selector) => {
                let session = self.find_session(&selector).await?;
                self.sessions.delete(&session.id).await?;
                println!("Deleted '{}'.", session.display_title());
            }
            Command::History => {
                let current = self.sessions.current().await.ok_or(ArchiveError::NoSessionSelected)?;
                let messages = self.sessions.messages(&current.id).await;
                if messages.is_empty() {
                    println!("No messages in '{}' yet.", current.display_title());
                }
                for message in &messages {
                    println!("{}", format_message(message));
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    /// Remove sessions that were opened but never used
    pub async fn shutdown(&self) {
        let removed = self.sessions.cleanup_empty_sessions().await;
        if removed > 0 {
            info!("Removed {} empty sessions", removed);
        }
    }

    fn report_unchanged(&self, outcome: std::result::Result<PageOutcome, QueryError>, edge: &str) {
        if let Ok(PageOutcome::Unchanged) = outcome {
            if self.view.state().params().is_none() {
                println!("Run a search first.");
            } else {
                println!("{}", edge);
            }
        }
    }

    async fn find_session(&self, selector: &str) -> Result<Session> {
        self.sessions
            .resolve(selector)
            .await
            .ok_or_else(|| ArchiveError::NotFound(format!("no session matches '{}'", selector)))
    }

    async fn print_sessions(&self) {
        for line in format_sessions(&self.sessions.snapshot().await) {
            println!("{}", line);
        }
    }
}
