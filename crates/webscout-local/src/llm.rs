use crate::ollama::{ollama_enabled, OllamaClient};
use crate::openai_compat::OpenAiCompatClient;
use crate::env;
use std::sync::Arc;
use webscout_core::{ChatModel, Error, Result};

pub const BACKEND_NAMES: [&str; 2] = ["openai_compat", "ollama"];

/// Stand-in when no model endpoint is configured. News-shortcut runs never
/// reach it; everything else surfaces its error as the answer.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredModel;

#[async_trait::async_trait]
impl ChatModel for UnconfiguredModel {
    fn name(&self) -> &str {
        "none"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Err(Error::NotConfigured(
            "no language model configured; set WEBSCOUT_OPENAI_COMPAT_BASE_URL and WEBSCOUT_OPENAI_COMPAT_MODEL, or WEBSCOUT_OLLAMA_ENABLE=1"
                .to_string(),
        ))
    }
}

/// Backends with enough configuration to be built, in `auto` preference order.
pub fn configured_chat_models() -> Vec<&'static str> {
    let mut out = Vec::new();
    if env("WEBSCOUT_OPENAI_COMPAT_BASE_URL").is_some() && env("WEBSCOUT_OPENAI_COMPAT_MODEL").is_some() {
        out.push("openai_compat");
    }
    if ollama_enabled() {
        out.push("ollama");
    }
    out
}

fn backend_by_name(client: reqwest::Client, name: &str) -> Result<Arc<dyn ChatModel>> {
    Ok(match name {
        "openai_compat" | "openai" => Arc::new(OpenAiCompatClient::from_env(client)?),
        "ollama" => Arc::new(OllamaClient::from_env(client)?),
        other => {
            return Err(Error::InvalidConfig(format!(
                "unknown llm backend '{other}' (expected auto|{})",
                BACKEND_NAMES.join("|")
            )))
        }
    })
}

/// Model selected by `WEBSCOUT_LLM` (default `auto`). The same model serves
/// as reasoner and judge.
pub fn chat_model_from_env(client: reqwest::Client) -> Result<Arc<dyn ChatModel>> {
    let choice = env("WEBSCOUT_LLM")
        .unwrap_or_else(|| "auto".to_string())
        .to_ascii_lowercase();
    if choice != "auto" {
        return backend_by_name(client, &choice);
    }
    match configured_chat_models().first() {
        Some(name) => backend_by_name(client, name),
        None => {
            tracing::debug!("no language model configured");
            Ok(Arc::new(UnconfiguredModel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testenv::{EnvGuard, ENV_LOCK};

    fn clear() -> Vec<EnvGuard> {
        [
            "WEBSCOUT_LLM",
            "WEBSCOUT_OPENAI_COMPAT_BASE_URL",
            "WEBSCOUT_OPENAI_COMPAT_MODEL",
            "WEBSCOUT_OPENAI_COMPAT_API_KEY",
            "WEBSCOUT_OLLAMA_ENABLE",
            "WEBSCOUT_OLLAMA_MODEL",
        ]
        .into_iter()
        .map(EnvGuard::unset)
        .collect()
    }

    #[tokio::test]
    async fn auto_without_config_is_unconfigured() {
        let m = {
            let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let _c = clear();
            assert!(configured_chat_models().is_empty());
            chat_model_from_env(reqwest::Client::new()).unwrap()
        };
        assert_eq!(m.name(), "none");
        assert!(matches!(
            m.complete("s", "u").await,
            Err(Error::NotConfigured(_))
        ));
    }

    #[test]
    fn auto_prefers_openai_compat_then_ollama() {
        let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _c = clear();
        let _o = EnvGuard::set("WEBSCOUT_OLLAMA_ENABLE", "true");
        assert_eq!(
            chat_model_from_env(reqwest::Client::new()).unwrap().name(),
            OllamaClient::DEFAULT_MODEL
        );
        let _b = EnvGuard::set("WEBSCOUT_OPENAI_COMPAT_BASE_URL", "http://127.0.0.1:9");
        let _m = EnvGuard::set("WEBSCOUT_OPENAI_COMPAT_MODEL", "gpt-test");
        assert_eq!(configured_chat_models(), vec!["openai_compat", "ollama"]);
        assert_eq!(
            chat_model_from_env(reqwest::Client::new()).unwrap().name(),
            "gpt-test"
        );
    }

    #[test]
    fn explicit_backend_must_be_known_and_configured() {
        let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _c = clear();
        let _s = EnvGuard::set("WEBSCOUT_LLM", "openai_compat");
        assert!(matches!(
            chat_model_from_env(reqwest::Client::new()),
            Err(Error::NotConfigured(_))
        ));
        let _s = EnvGuard::set("WEBSCOUT_LLM", "gemini");
        assert!(matches!(
            chat_model_from_env(reqwest::Client::new()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
