use crate::{env, env_any, env_parse};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use webscout_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};

pub const PROVIDER_NAMES: [&str; 4] = ["serper", "brave", "tavily", "searxng"];

fn search_timeout() -> Duration {
    // Provider requests can hang indefinitely without an explicit timeout.
    let ms = env_parse::<u64>("WEBSCOUT_SEARCH_TIMEOUT_MS")
        .unwrap_or(20_000)
        .clamp(1_000, 60_000);
    Duration::from_millis(ms)
}

fn serper_api_key_from_env() -> Option<String> {
    env_any(&["WEBSCOUT_SERPER_API_KEY", "SERPER_API_KEY"])
}

fn brave_api_key_from_env() -> Option<String> {
    env_any(&["WEBSCOUT_BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY"])
}

fn tavily_api_key_from_env() -> Option<String> {
    env_any(&["WEBSCOUT_TAVILY_API_KEY", "TAVILY_API_KEY"])
}

pub fn searxng_endpoints_from_env() -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    // Comma/whitespace-separated list for simple load spreading.
    if let Some(v) = env("WEBSCOUT_SEARXNG_ENDPOINTS") {
        for raw in v.split(|c: char| c == ',' || c.is_whitespace()) {
            let s = raw.trim();
            if !s.is_empty() && !out.iter().any(|e| e == s) {
                out.push(s.to_string());
            }
        }
    }
    if let Some(s) = env("WEBSCOUT_SEARXNG_ENDPOINT") {
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

fn finish(provider: &str, results: Vec<SearchResult>, t0: Instant) -> SearchResponse {
    let mut timings_ms = BTreeMap::new();
    timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
    tracing::debug!(provider, results = results.len(), "search finished");
    SearchResponse {
        results,
        provider: provider.to_string(),
        timings_ms,
    }
}

async fn send_checked(provider: &str, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let resp = req
        .timeout(search_timeout())
        .send()
        .await
        .map_err(|e| Error::Search(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Search(format!("{provider} search HTTP {status}")));
    }
    Ok(resp)
}

/// Google results via serper.dev.
#[derive(Debug, Clone)]
pub struct SerperSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerperSearchProvider {
    pub const DEFAULT_ENDPOINT: &'static str = "https://google.serper.dev/search";

    pub fn new(client: reqwest::Client, api_key: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.unwrap_or_else(|| Self::DEFAULT_ENDPOINT.to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serper_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing WEBSCOUT_SERPER_API_KEY (or SERPER_API_KEY)".to_string())
        })?;
        Ok(Self::new(client, api_key, env("WEBSCOUT_SERPER_ENDPOINT")))
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    // Absent when Google has no organic hits.
    organic: Option<Vec<SerperOrganic>>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearchProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let mut body = serde_json::json!({ "q": q.query });
        if let Some(n) = q.max_results {
            body["num"] = serde_json::json!(n);
        }
        let req = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body);
        let parsed: SerperResponse = send_checked("serper", req)
            .await?
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let mut out: Vec<SearchResult> = parsed
            .organic
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                title: r.title.unwrap_or_default(),
                snippet: r.snippet.unwrap_or_default(),
                url: r.link.filter(|l| !l.trim().is_empty()),
            })
            .collect();
        if let Some(n) = q.max_results {
            out.truncate(n);
        }
        Ok(finish("serper", out, t0))
    }
}

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl BraveSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing WEBSCOUT_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        env("WEBSCOUT_BRAVE_ENDPOINT")
            .unwrap_or_else(|| "https://api.search.brave.com/res/v1/web/search".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let mut req = self
            .client
            .get(Self::endpoint())
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", q.query.as_str())]);
        if let Some(n) = q.max_results {
            // Brave caps `count` at 20.
            req = req.query(&[("count", n.min(20).to_string())]);
        }
        let parsed: BraveWebSearchResponse = send_checked("brave", req)
            .await?
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let out = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                title: r.title.unwrap_or_default(),
                snippet: r.description.unwrap_or_default(),
                url: r.url,
            })
            .collect();
        Ok(finish("brave", out, t0))
    }
}

#[derive(Debug, Clone)]
pub struct TavilySearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = tavily_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing WEBSCOUT_TAVILY_API_KEY (or TAVILY_API_KEY)".to_string())
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        env("WEBSCOUT_TAVILY_ENDPOINT").unwrap_or_else(|| "https://api.tavily.com/search".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: Option<String>,
    title: Option<String>,
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for TavilySearchProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let body = serde_json::json!({
            "query": q.query,
            "max_results": q.max_results.unwrap_or(5).min(20),
            "include_answer": false,
            "include_raw_content": false,
            "search_depth": "basic",
        });
        let req = self
            .client
            .post(Self::endpoint())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&body);
        let parsed: TavilySearchResponse = send_checked("tavily", req)
            .await?
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let out = parsed
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title.unwrap_or_default(),
                snippet: r.content.unwrap_or_default(),
                url: r.url,
            })
            .collect();
        Ok(finish("tavily", out, t0))
    }
}

#[derive(Debug, Clone)]
pub struct SearxngSearchProvider {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl SearxngSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let endpoints = searxng_endpoints_from_env();
        if endpoints.is_empty() {
            return Err(Error::NotConfigured(
                "missing WEBSCOUT_SEARXNG_ENDPOINT (or WEBSCOUT_SEARXNG_ENDPOINTS)".to_string(),
            ));
        }
        Ok(Self { client, endpoints })
    }

    fn endpoint_search_for(base_endpoint: &str) -> String {
        // Accept either a base URL or a full /search endpoint.
        let mut base = base_endpoint.trim().trim_end_matches('/').to_string();
        if !base.ends_with("/search") {
            base.push_str("/search");
        }
        base
    }

    /// FNV-1a over the query text; stable across runs unlike `RandomState`.
    fn stable_hash64(query: &str) -> u64 {
        let mut h: u64 = 1469598103934665603;
        for b in query.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(1099511628211);
        }
        h
    }

    fn pick_endpoint(&self, q: &SearchQuery) -> &str {
        if self.endpoints.is_empty() {
            return "";
        }
        let idx = (Self::stable_hash64(&q.query) as usize) % self.endpoints.len();
        &self.endpoints[idx]
    }
}

#[derive(Debug, Deserialize)]
struct SearxngSearchResponse {
    results: Option<Vec<SearxngResult>>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
    title: Option<String>,
    // SearXNG uses `content` for snippets in JSON format.
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SearxngSearchProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let max_results = q.max_results.unwrap_or(10).min(20);
        let endpoint = Self::endpoint_search_for(self.pick_endpoint(q));
        let req = self
            .client
            .get(endpoint)
            .query(&[("q", q.query.as_str()), ("format", "json")]);
        let parsed: SearxngSearchResponse = send_checked("searxng", req)
            .await?
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let out = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r.title.unwrap_or_default(),
                snippet: r.content.unwrap_or_default(),
                url: r.url,
            })
            .collect();
        Ok(finish("searxng", out, t0))
    }
}

/// Stand-in when no provider has credentials: every search fails with a
/// `NotConfigured` error, which the tools render inline.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredSearch;

#[async_trait::async_trait]
impl SearchProvider for UnconfiguredSearch {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn search(&self, _q: &SearchQuery) -> Result<SearchResponse> {
        Err(Error::NotConfigured(
            "no search provider configured; set WEBSCOUT_SERPER_API_KEY (or another provider key)"
                .to_string(),
        ))
    }
}

fn provider_by_name(client: reqwest::Client, name: &str) -> Result<Arc<dyn SearchProvider>> {
    Ok(match name {
        "serper" => Arc::new(SerperSearchProvider::from_env(client)?),
        "brave" => Arc::new(BraveSearchProvider::from_env(client)?),
        "tavily" => Arc::new(TavilySearchProvider::from_env(client)?),
        "searxng" => Arc::new(SearxngSearchProvider::from_env(client)?),
        other => {
            return Err(Error::InvalidConfig(format!(
                "unknown search provider '{other}' (expected auto|{})",
                PROVIDER_NAMES.join("|")
            )))
        }
    })
}

/// Providers whose credentials/endpoints are present, in `auto` preference order.
pub fn configured_search_providers() -> Vec<&'static str> {
    let mut out = Vec::new();
    if serper_api_key_from_env().is_some() {
        out.push("serper");
    }
    if brave_api_key_from_env().is_some() {
        out.push("brave");
    }
    if tavily_api_key_from_env().is_some() {
        out.push("tavily");
    }
    if !searxng_endpoints_from_env().is_empty() {
        out.push("searxng");
    }
    out
}

/// Provider selected by `WEBSCOUT_SEARCH_PROVIDER` (default `auto`).
///
/// `auto` picks the first configured provider and falls back to
/// [`UnconfiguredSearch`]; naming a provider that lacks credentials is an error.
pub fn search_provider_from_env(client: reqwest::Client) -> Result<Arc<dyn SearchProvider>> {
    let choice = env("WEBSCOUT_SEARCH_PROVIDER")
        .unwrap_or_else(|| "auto".to_string())
        .to_ascii_lowercase();
    if choice != "auto" {
        return provider_by_name(client, &choice);
    }
    match configured_search_providers().first() {
        Some(name) => provider_by_name(client, name),
        None => {
            tracing::warn!("no search provider configured");
            Ok(Arc::new(UnconfiguredSearch))
        }
    }
}
