use crate::{env, env_parse};
use serde::{Deserialize, Serialize};
use webscout_core::{ChatModel, Error, Result};

/// Sampling and transport knobs shared by the chat clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub timeout_ms: u64,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            temperature: Some(0.0),
            max_tokens: None,
        }
    }
}

impl ChatOptions {
    /// `WEBSCOUT_LLM_TIMEOUT_MS`, `WEBSCOUT_LLM_TEMPERATURE`, `WEBSCOUT_LLM_MAX_TOKENS`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            timeout_ms: env_parse::<u64>("WEBSCOUT_LLM_TIMEOUT_MS")
                .unwrap_or(d.timeout_ms)
                .clamp(1_000, 600_000),
            temperature: env_parse::<f64>("WEBSCOUT_LLM_TEMPERATURE").or(d.temperature),
            max_tokens: env_parse::<u64>("WEBSCOUT_LLM_MAX_TOKENS").or(d.max_tokens),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    options: ChatOptions,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        options: ChatOptions,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            options,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let base_url = env("WEBSCOUT_OPENAI_COMPAT_BASE_URL").ok_or_else(|| {
            Error::NotConfigured("missing WEBSCOUT_OPENAI_COMPAT_BASE_URL".to_string())
        })?;
        let model = env("WEBSCOUT_OPENAI_COMPAT_MODEL").ok_or_else(|| {
            Error::NotConfigured("missing WEBSCOUT_OPENAI_COMPAT_MODEL".to_string())
        })?;
        Ok(Self::new(
            client,
            base_url,
            env("WEBSCOUT_OPENAI_COMPAT_API_KEY"),
            model,
            ChatOptions::from_env(),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(self.options.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let t0 = std::time::Instant::now();
        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "openai_compat chat.completions HTTP {status}"
            )));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        tracing::debug!(
            model = %self.model,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = text.len(),
            "openai_compat completion"
        );
        Ok(text)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    // Null for tool-call-only replies.
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn sends_system_and_user_messages_and_reads_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let echo = format!(
                    "{}|{}|{}|{}|{}",
                    body["model"].as_str().unwrap_or_default(),
                    body["messages"][0]["role"].as_str().unwrap_or_default(),
                    body["messages"][1]["content"].as_str().unwrap_or_default(),
                    body["temperature"],
                    auth
                );
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": echo}}]
                }))
            }),
        );
        let base = serve(app).await;
        let c = OpenAiCompatClient::new(
            reqwest::Client::new(),
            base,
            Some("sk-test".to_string()),
            "m1",
            ChatOptions::default(),
        );
        assert_eq!(c.name(), "m1");
        let out = c.complete("sys", "hello").await.unwrap();
        assert_eq!(out, "m1|system|hello|0.0|Bearer sk-test");
    }

    #[tokio::test]
    async fn http_errors_and_empty_choices() {
        let app = Router::new()
            .route(
                "/bad/v1/chat/completions",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route(
                "/empty/v1/chat/completions",
                post(|| async { Json(serde_json::json!({"choices": []})) }),
            );
        let base = serve(app).await;
        let bad = OpenAiCompatClient::new(
            reqwest::Client::new(),
            format!("{base}bad"),
            None,
            "m",
            ChatOptions::default(),
        );
        assert!(matches!(
            bad.complete("s", "u").await,
            Err(Error::Llm(ref m)) if m.contains("500")
        ));
        let empty = OpenAiCompatClient::new(
            reqwest::Client::new(),
            format!("{base}empty"),
            None,
            "m",
            ChatOptions::default(),
        );
        assert_eq!(empty.complete("s", "u").await.unwrap(), "");
    }

    #[test]
    fn parses_null_content() {
        let js = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatCompletionsResponse = serde_json::from_str(js).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
