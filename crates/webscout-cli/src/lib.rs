//! `webscout` crate (library surface).
//!
//! The primary entrypoint is the `webscout` binary. This module holds the
//! pieces the binary wires together so they can be reused and tested
//! without spawning a process.

pub mod chat;

pub use webscout_core as core;
pub use webscout_local as local;

use std::path::Path;
use std::sync::Arc;
use webscout_core::{AgentConfig, ChatModel, LlmReasoner, Orchestrator, ToolRegistry};
use webscout_local::{chat_model_from_env, search_provider_from_env, HttpFetcher};

/// The assembled assistant: one model serves as both reasoner and judge.
pub type Agent = Orchestrator<LlmReasoner<Arc<dyn ChatModel>>>;

pub fn agent_from_env(config: AgentConfig) -> anyhow::Result<Agent> {
    agent_with_client(webscout_local::default_client()?, config)
}

pub fn agent_with_client(client: reqwest::Client, config: AgentConfig) -> anyhow::Result<Agent> {
    let search = search_provider_from_env(client.clone())?;
    let fetcher = Arc::new(HttpFetcher::from_env(client.clone()));
    let model = chat_model_from_env(client)?;
    tracing::debug!(search = search.name(), model = model.name(), "agent assembled");
    let reasoner = LlmReasoner::new(model.clone(), config.max_observation_chars);
    let tools = ToolRegistry::new(search, fetcher, model, config)?;
    Ok(Orchestrator::new(tools, reasoner))
}

/// Load `KEY=VALUE` lines into the process environment.
///
/// Blank lines and `#` comments are skipped, an optional `export ` prefix and
/// matching quotes around the value are stripped, and variables that are
/// already set are never overridden. Returns how many variables were set.
pub fn load_env_file(path: &Path) -> std::io::Result<usize> {
    let txt = std::fs::read_to_string(path)?;
    let mut n = 0;
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        let v = v.trim();
        let v = ['"', '\'']
            .iter()
            .find_map(|q| v.strip_prefix(*q).and_then(|x| x.strip_suffix(*q)))
            .unwrap_or(v);
        // Don't override explicit process env.
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
            n += 1;
        }
    }
    Ok(n)
}

/// `WEBSCOUT_ENV_FILE` first, then `./.env` unless `WEBSCOUT_DOTENV=0`.
///
/// Values are never logged; only the file and the count are.
pub fn load_env_files() {
    if let Some(p) = std::env::var("WEBSCOUT_ENV_FILE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        match load_env_file(Path::new(&p)) {
            Ok(n) => tracing::debug!(path = %p, vars = n, "env file loaded"),
            Err(e) => tracing::warn!(path = %p, error = %e, "env file not loaded"),
        }
    }
    let dotenv_off = std::env::var("WEBSCOUT_DOTENV")
        .map(|v| matches!(v.trim(), "0" | "false" | "off"))
        .unwrap_or(false);
    let dotenv = Path::new(".env");
    if !dotenv_off && dotenv.is_file() {
        if let Ok(n) = load_env_file(dotenv) {
            tracing::debug!(vars = n, ".env loaded");
        }
    }
}
