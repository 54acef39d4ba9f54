use super::health::styled_summary;
use super::{api_client, render};
use anyhow::Result;
use colored::Colorize;
use doks_application::{ConversationStore, HealthMonitor};
use doks_core::config::DoksConfig;
use doks_core::schedule::TokioScheduler;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

const SLASH_COMMANDS: [&str; 5] = ["/new", "/clear", "/health", "/help", "/quit"];

/// Completion and hints for slash commands.
struct ChatHelper;

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') {
            return Ok((0, Vec::new()));
        }

        let candidates = SLASH_COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for ChatHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        SLASH_COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Validator for ChatHelper {}

/// What a line of input asks for.
#[derive(Debug, PartialEq)]
enum ChatInput<'a> {
    Question(&'a str),
    NewSession,
    ClearSession,
    Health,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

fn parse_input(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    match trimmed {
        "" => ChatInput::Empty,
        "/new" => ChatInput::NewSession,
        "/clear" => ChatInput::ClearSession,
        "/health" => ChatInput::Health,
        "/help" => ChatInput::Help,
        "/quit" | "/exit" | "quit" | "exit" => ChatInput::Quit,
        cmd if cmd.starts_with('/') => ChatInput::Unknown(cmd),
        question => ChatInput::Question(question),
    }
}

fn print_help() {
    println!("{}", "Type a question, or one of:".bright_black());
    println!("{}", "  /new     start a new session".bright_black());
    println!("{}", "  /clear   discard the current session".bright_black());
    println!("{}", "  /health  check the API now".bright_black());
    println!("{}", "  /quit    leave".bright_black());
}

/// Interactive chat loop.
///
/// The health monitor polls in the background and is told about transport
/// failures of queries, so an outage shows up without waiting for the next
/// scheduled check.
pub async fn run(config: &DoksConfig, doc_id: Option<&str>) -> Result<()> {
    let client = api_client(config)?;
    let monitor = HealthMonitor::new(
        client.clone(),
        Arc::new(TokioScheduler),
        config.health.clone(),
    );
    let store = ConversationStore::new(client, config.query.clone())
        .with_health_sink(monitor.clone());

    println!("{}", "=== DoksAI chat ===".bright_magenta().bold());
    if let Some(doc_id) = doc_id {
        println!("{}", format!("Scoped to document {}", doc_id).bright_black());
    }

    monitor.start().await;
    println!("{}", styled_summary(&monitor));
    let health_printer = spawn_health_printer(monitor.clone());

    print_help();
    println!();

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ChatHelper));
    let mut session_id = store.create_session(None).await;

    loop {
        let readline = tokio::task::block_in_place(|| rl.readline(">> "));

        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        let input = parse_input(&line);
        if input != ChatInput::Empty {
            let _ = rl.add_history_entry(line.as_str());
        }

        match input {
            ChatInput::Empty => {}
            ChatInput::Quit => break,
            ChatInput::Help => print_help(),
            ChatInput::Unknown(cmd) => {
                println!("{}", format!("Unknown command {}", cmd).bright_black());
            }
            ChatInput::Health => {
                monitor.check_health(true).await;
                println!("{}", styled_summary(&monitor));
            }
            ChatInput::NewSession => {
                session_id = store.create_session(None).await;
                println!("{}", "Started a new session.".bright_black());
            }
            ChatInput::ClearSession => {
                store.clear_session(&session_id).await;
                session_id = store.create_session(None).await;
                println!("{}", "Session cleared.".bright_black());
            }
            ChatInput::Question(question) => {
                render::ask_and_render(&store, &session_id, question, doc_id).await?;
                println!();
            }
        }
    }

    health_printer.abort();
    monitor.stop();
    println!("{}", "Goodbye!".bright_green());
    Ok(())
}

/// Prints a line whenever reachability flips.
fn spawn_health_printer(monitor: Arc<HealthMonitor>) -> tokio::task::JoinHandle<()> {
    let mut updates = monitor.subscribe();
    tokio::spawn(async move {
        let mut last = updates.borrow_and_update().is_healthy;
        while updates.changed().await.is_ok() {
            let current = updates.borrow_and_update().is_healthy;
            if current != last && current.is_some() {
                println!("{}", styled_summary(&monitor));
            }
            last = current;
        }
    })
}
