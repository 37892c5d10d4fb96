use crate::env;
use crate::openai_compat::ChatOptions;
use serde::{Deserialize, Serialize};
use webscout_core::{ChatModel, Error, Result};

pub(crate) fn ollama_enabled() -> bool {
    env("WEBSCOUT_OLLAMA_ENABLE")
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: ChatOptions,
}

impl OllamaClient {
    pub const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:11434";
    pub const DEFAULT_MODEL: &'static str = "qwen2.5:3b-instruct";

    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        options: ChatOptions,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            options,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        // Opt-in: don't start calling localhost unless asked to.
        if !ollama_enabled() {
            return Err(Error::NotConfigured(
                "WEBSCOUT_OLLAMA_ENABLE is not set (or false)".to_string(),
            ));
        }
        Ok(Self::new(
            client,
            env("WEBSCOUT_OLLAMA_BASE_URL").unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            env("WEBSCOUT_OLLAMA_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            ChatOptions::from_env(),
        ))
    }

    fn endpoint_chat(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl ChatModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            stream: Some(false),
            options: self.options.temperature.map(|t| ChatRequestOptions {
                temperature: Some(t),
            }),
        };

        let resp = self
            .client
            .post(self.endpoint_chat())
            .timeout(std::time::Duration::from_millis(self.options.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("ollama chat HTTP {status}")));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatRequestOptions>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}
