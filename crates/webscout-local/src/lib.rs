use std::time::Duration;
use webscout_core::{Error, PageFetcher, Result};

pub mod extract;
pub mod llm;
pub mod ollama;
pub mod openai_compat;
pub mod search;

pub use llm::{chat_model_from_env, configured_chat_models, UnconfiguredModel};
pub use search::{configured_search_providers, search_provider_from_env, UnconfiguredSearch};

const USER_AGENT: &str = concat!("webscout/", env!("CARGO_PKG_VERSION"));

/// Non-empty, trimmed env var. Empty strings count as unset.
pub(crate) fn env(k: &str) -> Option<String> {
    std::env::var(k)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First non-empty var of `keys`.
pub(crate) fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| env(k))
}

pub(crate) fn env_parse<T: std::str::FromStr>(k: &str) -> Option<T> {
    env(k).and_then(|s| s.parse().ok())
}

/// Shared HTTP client for search, fetch and model calls.
///
/// Per-request timeouts override the 30s default; the connect timeout keeps
/// DNS/TLS stalls from hanging a step.
pub fn default_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}

/// Fetches a page over HTTP(S) and reduces it to paragraph text.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    max_paragraphs: usize,
}

impl HttpFetcher {
    pub const DEFAULT_MAX_BYTES: usize = 2 * 1024 * 1024;

    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: Self::DEFAULT_MAX_BYTES,
            max_paragraphs: extract::DEFAULT_MAX_PARAGRAPHS,
        }
    }

    /// `WEBSCOUT_FETCH_MAX_BYTES` caps how much of each body is read.
    pub fn from_env(client: reqwest::Client) -> Self {
        let mut f = Self::new(client);
        if let Some(n) = env_parse::<usize>("WEBSCOUT_FETCH_MAX_BYTES").filter(|n| *n > 0) {
            f.max_bytes = n;
        }
        f
    }

    pub fn with_max_paragraphs(mut self, n: usize) -> Self {
        self.max_paragraphs = n;
        self
    }

    fn check_url(raw: &str) -> Result<url::Url> {
        let url = url::Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::InvalidUrl(format!("unsupported scheme '{other}' in {raw}"))),
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String> {
        let url = Self::check_url(url)?;
        let t0 = std::time::Instant::now();
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {status}")));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();

        let mut bytes = Vec::new();
        let mut truncated = false;
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > self.max_bytes {
                let can_take = self.max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&bytes);
        let text = if content_type.starts_with("text/plain") {
            extract::plain_text_lines(&body, self.max_paragraphs)
        } else {
            extract::paragraph_text(&body, self.max_paragraphs)
        };
        tracing::debug!(
            url = %url,
            bytes = bytes.len(),
            truncated,
            chars = text.chars().count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "page fetched"
        );
        Ok(text)
    }
}
