use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod assess;
pub mod config;
pub mod lenient;
pub mod orchestrator;
pub mod reason;
pub mod session;
pub mod tools;

pub use assess::{Assessment, Assessor, Reliability};
pub use config::AgentConfig;
pub use lenient::{InputShape, Lenient};
pub use orchestrator::{Orchestrator, Route, RunOutcome, ToolInvocation, Transcript, TranscriptEntry};
pub use reason::{LlmReasoner, NextAction, Reasoner, ReasoningContext};
pub use session::{ChatTurn, InMemorySessionStore, Role, SessionId, SessionStore};
pub use tools::{ToolName, ToolRegistry, ToolRequest, ToolResponse, ToolSpec};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("session error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_results: Option<usize>) -> Self {
        Self {
            query: query.into(),
            max_results,
        }
    }
}

/// One organic search hit. Providers may omit any field; `url` is the only one
/// callers branch on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

impl SearchResponse {
    /// Result URLs in provider order, skipping hits without a link.
    pub fn urls(&self) -> Vec<String> {
        self.results.iter().filter_map(|r| r.url.clone()).collect()
    }
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

/// Text extracted from one page. Lives only for the duration of a tool call.
#[derive(Debug)]
pub struct FetchedContent {
    pub url: String,
    pub body: Result<String>,
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return its extracted plain text.
    ///
    /// Implementations should honor `timeout`; callers additionally bound the
    /// whole call with the same duration.
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// A text-in/text-out language model endpoint.
///
/// Both the relevance judge and the ReAct reasoner are built on this.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[async_trait::async_trait]
impl<T: ChatModel + ?Sized> ChatModel for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        (**self).complete(system, user).await
    }
}

/// Truncate to at most `max_chars` characters (never splits a code point).
pub fn clip_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
