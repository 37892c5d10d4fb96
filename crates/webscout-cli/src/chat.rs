//! Line-oriented chat UI: one question per line, slash commands for sessions.
//!
//! The UI owns the session store; the agent only ever sees the current query.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use webscout_core::session::{export_file_name, export_markdown, session_title};
use webscout_core::{ChatTurn, Orchestrator, Reasoner, RunOutcome, SessionId, SessionStore};

pub const HELP: &str = "\
Type a question to research it. Commands:
  /new            start a new session
  /sessions       list sessions (newest first)
  /switch N       switch to session N
  /export [PATH]  write the current session as markdown
  /help           show this help
  /quit           exit";

/// Anything that turns a question into `(answer, news)`.
#[async_trait::async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, query: &str) -> RunOutcome;
}

#[async_trait::async_trait]
impl<R: Reasoner> Answerer for Orchestrator<R> {
    async fn answer(&self, query: &str) -> RunOutcome {
        self.run(query).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    New,
    Sessions,
    Switch(u64),
    Export(Option<PathBuf>),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

pub fn parse_command(line: &str) -> Command {
    let s = line.trim();
    if s.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = s.strip_prefix('/') else {
        return Command::Ask(s.to_string());
    };
    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (rest, ""),
    };
    match cmd.to_ascii_lowercase().as_str() {
        "new" => Command::New,
        "sessions" | "list" => Command::Sessions,
        "switch" => match arg.parse::<u64>() {
            Ok(n) => Command::Switch(n),
            Err(_) => Command::Invalid(format!("usage: /switch N (got '{arg}')")),
        },
        "export" => Command::Export((!arg.is_empty()).then(|| PathBuf::from(arg))),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Invalid(format!("unknown command '/{other}'; try /help")),
    }
}

pub struct ChatUi<A> {
    agent: A,
    store: Arc<dyn SessionStore>,
    current: SessionId,
}

impl<A: Answerer> ChatUi<A> {
    /// Starts with a fresh session selected.
    pub fn new(agent: A, store: Arc<dyn SessionStore>) -> Self {
        let current = store.create();
        Self {
            agent,
            store,
            current,
        }
    }

    pub fn current(&self) -> SessionId {
        self.current
    }

    /// Apply one command. `Ok(None)` means quit.
    pub async fn handle(&mut self, cmd: Command) -> anyhow::Result<Option<String>> {
        let reply = match cmd {
            Command::Quit => return Ok(None),
            Command::Empty => String::new(),
            Command::Help => HELP.to_string(),
            Command::Invalid(msg) => msg,
            Command::New => {
                self.current = self.store.create();
                format!("Started session {}.", self.current)
            }
            Command::Sessions => self.list_sessions()?,
            Command::Switch(n) => {
                let id = SessionId(n);
                if self.store.sessions().contains(&id) {
                    self.current = id;
                    format!("Switched to session {id}.")
                } else {
                    format!("No session {n}; see /sessions.")
                }
            }
            Command::Export(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(export_file_name(self.current)));
                let turns = self.store.list(self.current)?;
                std::fs::write(&path, export_markdown(&turns))?;
                tracing::info!(session = %self.current, path = %path.display(), "session exported");
                format!("Exported session {} to {}.", self.current, path.display())
            }
            Command::Ask(query) => {
                self.store.append(self.current, ChatTurn::user(query.as_str()))?;
                let out = self.agent.answer(&query).await;
                self.store
                    .append(self.current, ChatTurn::assistant(out.answer.as_str()))?;
                out.answer
            }
        };
        Ok(Some(reply))
    }

    fn list_sessions(&self) -> anyhow::Result<String> {
        let mut lines = Vec::new();
        for id in self.store.sessions().into_iter().rev() {
            let turns = self.store.list(id)?;
            let marker = if id == self.current { "*" } else { " " };
            lines.push(format!("{marker} {id}: {}", session_title(id, &turns)));
        }
        Ok(lines.join("\n"))
    }

    /// Read commands until EOF or `/quit`, writing replies to `out`.
    pub async fn run<I, O>(&mut self, input: I, mut out: O) -> anyhow::Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: std::io::Write,
    {
        let mut lines = input.lines();
        loop {
            write!(out, "[{}] > ", self.current)?;
            out.flush()?;
            let Some(line) = lines.next_line().await? else {
                writeln!(out)?;
                break;
            };
            match self.handle(parse_command(&line)).await {
                Ok(None) => break,
                Ok(Some(reply)) if reply.is_empty() => {}
                Ok(Some(reply)) => writeln!(out, "{reply}\n")?,
                // A failed export or store error ends the command, not the session.
                Err(e) => writeln!(out, "Error: {e:#}\n")?,
            }
        }
        Ok(())
    }
}
