//! The fixed tool surface exposed to the reason-act loop.
//!
//! Tools speak text on both sides (the reasoner only sees text), but inside
//! the registry every call goes through a tagged [`ToolRequest`] and comes
//! back as a tagged [`ToolResponse`] before being rendered.

use crate::assess::{Assessment, Assessor};
use crate::config::AgentConfig;
use crate::lenient::{self, InputShape, Lenient};
use crate::{ChatModel, Error, FetchedContent, PageFetcher, Result, SearchProvider, SearchQuery, SearchResult};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ToolName {
    #[serde(rename = "search-urls")]
    SearchUrls,
    #[serde(rename = "fetch-text")]
    FetchText,
    #[serde(rename = "analyze-content")]
    AnalyzeContent,
    #[serde(rename = "aggregate-news")]
    AggregateNews,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::SearchUrls,
        ToolName::FetchText,
        ToolName::AnalyzeContent,
        ToolName::AggregateNews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::SearchUrls => "search-urls",
            ToolName::FetchText => "fetch-text",
            ToolName::AnalyzeContent => "analyze-content",
            ToolName::AggregateNews => "aggregate-news",
        }
    }

    /// Accepts the wire name with `_`/space separators, any case, and stray
    /// markdown or quotes around it.
    pub fn parse(s: &str) -> Option<Self> {
        let norm: String = s
            .trim()
            .trim_matches(|c: char| matches!(c, '`' | '*' | '"' | '\'' | '[' | ']'))
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        Self::ALL.into_iter().find(|t| t.as_str() == norm)
    }

    pub fn spec(&self) -> &'static ToolSpec {
        let idx = Self::ALL.iter().position(|t| t == self).unwrap_or(0);
        &TOOL_SPECS[idx]
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared text contract for one tool (shown to the reasoner).
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: ToolName,
    pub description: &'static str,
    pub input: &'static str,
    pub output: &'static str,
}

pub static TOOL_SPECS: [ToolSpec; 4] = [
    ToolSpec {
        name: ToolName::SearchUrls,
        description: "Search the web and list result URLs for further research.",
        input: "a search query (plain text)",
        output: "a JSON list of URLs, best match first",
    },
    ToolSpec {
        name: ToolName::FetchText,
        description: "Download web pages and extract their main paragraph text.",
        input: "a JSON list of URLs (at most 5 are read) or a single URL",
        output: "a JSON list of page texts in the same order as the input URLs",
    },
    ToolSpec {
        name: ToolName::AnalyzeContent,
        description: "Judge how relevant and reliable fetched texts are for a query.",
        input: r#"{"query": "<question>", "contents": ["<text>", ...]}"#,
        output: "assessments of the useful sources (score 7/10 or higher), with summaries",
    },
    ToolSpec {
        name: ToolName::AggregateNews,
        description: "Collect the latest news headlines for a topic.",
        input: "a news topic (plain text)",
        output: "a list of headlines with snippet and link",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzeRequest {
    pub query: String,
    pub contents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    SearchUrls { query: String },
    FetchText { urls: Vec<String> },
    AnalyzeContent(AnalyzeRequest),
    AggregateNews { topic: String },
}

impl ToolRequest {
    /// Parse `raw` for `tool`. Never fails; see [`lenient`].
    pub fn parse(tool: ToolName, raw: &str) -> Lenient<ToolRequest> {
        fn map<T>(l: Lenient<T>, f: impl FnOnce(T) -> ToolRequest) -> Lenient<ToolRequest> {
            Lenient {
                value: f(l.value),
                shape: l.shape,
            }
        }
        match tool {
            ToolName::SearchUrls => map(lenient::parse_text(raw), |query| ToolRequest::SearchUrls { query }),
            ToolName::FetchText => map(lenient::parse_url_list(raw), |urls| ToolRequest::FetchText { urls }),
            ToolName::AnalyzeContent => map(lenient::parse_analyze_input(raw), ToolRequest::AnalyzeContent),
            ToolName::AggregateNews => map(lenient::parse_text(raw), |topic| ToolRequest::AggregateNews { topic }),
        }
    }

    pub fn tool(&self) -> ToolName {
        match self {
            ToolRequest::SearchUrls { .. } => ToolName::SearchUrls,
            ToolRequest::FetchText { .. } => ToolName::FetchText,
            ToolRequest::AnalyzeContent(_) => ToolName::AnalyzeContent,
            ToolRequest::AggregateNews { .. } => ToolName::AggregateNews,
        }
    }
}

#[derive(Debug)]
pub struct AnalyzeReport {
    pub query: String,
    /// (1-based source index, assessment) for every item at or above `min_score`.
    pub kept: Vec<(usize, Assessment)>,
    /// One line per content item whose judge call failed.
    pub errors: Vec<String>,
    pub analyzed: usize,
    pub min_score: u8,
}

#[derive(Debug)]
pub enum ToolResponse {
    Urls(Vec<String>),
    Texts(Vec<FetchedContent>),
    Analysis(AnalyzeReport),
    News { topic: String, items: Vec<SearchResult> },
    /// The tool could not produce anything (e.g. the search provider failed).
    Failed(String),
}

pub fn fetch_error_placeholder(url: &str, e: &Error) -> String {
    format!("[fetch error: {url}: {e}]")
}

pub fn render_news_item(item: &SearchResult) -> String {
    let title = if item.title.trim().is_empty() {
        "(untitled)"
    } else {
        item.title.trim()
    };
    let link = item.url.as_deref().unwrap_or("(no link)");
    format!("🔹 **{title}**\n{}\n🔗 {link}", item.snippet.trim())
}

impl ToolResponse {
    pub fn render(&self) -> String {
        match self {
            ToolResponse::Urls(urls) => {
                serde_json::to_string(urls).unwrap_or_else(|_| "[]".to_string())
            }
            ToolResponse::Texts(items) => {
                let texts: Vec<String> = items
                    .iter()
                    .map(|c| match &c.body {
                        Ok(text) => text.clone(),
                        Err(e) => fetch_error_placeholder(&c.url, e),
                    })
                    .collect();
                serde_json::to_string(&texts).unwrap_or_else(|_| "[]".to_string())
            }
            ToolResponse::Analysis(report) => render_analysis(report),
            ToolResponse::News { topic, items } => {
                if items.is_empty() {
                    return format!("No news found for '{topic}'.");
                }
                items
                    .iter()
                    .map(render_news_item)
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            ToolResponse::Failed(message) => format!("Error: {message}"),
        }
    }
}

fn render_analysis(r: &AnalyzeReport) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (idx, a) in &r.kept {
        let reliability = a
            .reliability
            .map(|x| format!("{x:?}"))
            .unwrap_or_else(|| "Unknown".to_string());
        lines.push(format!(
            "Source {idx} (score {}/10, reliability {reliability}):\n{}",
            a.score, a.raw
        ));
    }
    lines.extend(r.errors.iter().cloned());
    if r.kept.is_empty() {
        if r.analyzed == 0 && r.errors.is_empty() {
            lines.push(format!(
                "No relevant content found: there was no content to analyze for '{}'.",
                r.query
            ));
        } else {
            lines.push(format!(
                "No relevant content found: none of the {} analyzed sources scored at least {}/10.",
                r.analyzed, r.min_score
            ));
        }
    }
    lines.join("\n")
}

/// The callable capabilities, bound to concrete collaborators.
pub struct ToolRegistry {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    assessor: Assessor<Arc<dyn ChatModel>>,
    config: AgentConfig,
}

impl ToolRegistry {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        judge: Arc<dyn ChatModel>,
        config: AgentConfig,
    ) -> Result<Self> {
        config.validate()?;
        let assessor = Assessor::new(judge, config.score_regex()?, config.max_judge_chars);
        Ok(Self {
            search,
            fetcher,
            assessor,
            config,
        })
    }

    pub fn specs(&self) -> &'static [ToolSpec] {
        &TOOL_SPECS
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Text in, text out: the form the reasoner sees.
    pub async fn invoke(&self, tool: ToolName, raw_input: &str) -> String {
        let parsed = ToolRequest::parse(tool, raw_input);
        if parsed.shape != InputShape::Structured {
            tracing::debug!(tool = %tool, shape = ?parsed.shape, "tool input parsed leniently");
        }
        self.execute(parsed.value).await.render()
    }

    pub async fn execute(&self, req: ToolRequest) -> ToolResponse {
        let tool = req.tool();
        let t0 = Instant::now();
        let out = match req {
            ToolRequest::SearchUrls { query } => self.search_urls(&query).await,
            ToolRequest::FetchText { urls } => self.fetch_text(&urls).await,
            ToolRequest::AnalyzeContent(r) => self.analyze_content(&r).await,
            ToolRequest::AggregateNews { topic } => self.aggregate_news(&topic).await,
        };
        tracing::debug!(tool = %tool, elapsed_ms = t0.elapsed().as_millis() as u64, "tool finished");
        out
    }

    pub async fn search_urls(&self, query: &str) -> ToolResponse {
        let q = SearchQuery::new(query, Some(self.config.search_results));
        match self.search.search(&q).await {
            Ok(resp) => ToolResponse::Urls(resp.urls()),
            Err(e) => {
                tracing::warn!(provider = self.search.name(), error = %e, "search failed");
                ToolResponse::Failed(format!("searching for '{query}' failed: {e}"))
            }
        }
    }

    /// Fetch up to `max_fetch_urls` pages concurrently. The output has one
    /// slot per processed URL, in input order; failures stay in their slot.
    pub async fn fetch_text(&self, urls: &[String]) -> ToolResponse {
        let cap = self.config.max_fetch_urls;
        if urls.len() > cap {
            tracing::debug!(requested = urls.len(), cap, "fetch-text capped url list");
        }
        let timeout = self.config.fetch_timeout();
        let jobs = urls.iter().take(cap).map(|url| async move {
            let body = match tokio::time::timeout(timeout, self.fetcher.fetch_text(url, timeout)).await {
                Ok(r) => r,
                Err(_) => Err(Error::Fetch(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                ))),
            };
            if let Err(e) = &body {
                tracing::warn!(url = %url, error = %e, "fetch failed");
            }
            FetchedContent {
                url: url.clone(),
                body,
            }
        });
        ToolResponse::Texts(futures::future::join_all(jobs).await)
    }

    pub async fn analyze_content(&self, req: &AnalyzeRequest) -> ToolResponse {
        let mut report = AnalyzeReport {
            query: req.query.clone(),
            kept: Vec::new(),
            errors: Vec::new(),
            analyzed: 0,
            min_score: self.config.min_score,
        };
        for (i, content) in req.contents.iter().enumerate() {
            if content.trim().is_empty() {
                continue;
            }
            let idx = i + 1;
            match self.assessor.assess(&req.query, content).await {
                Ok(a) => {
                    report.analyzed += 1;
                    tracing::debug!(source = idx, score = a.score, relevant = a.relevant, "assessed");
                    if a.score >= self.config.min_score {
                        report.kept.push((idx, a));
                    }
                }
                Err(e) => {
                    tracing::warn!(source = idx, error = %e, "judge failed");
                    report.errors.push(format!("Error analyzing source {idx}: {e}"));
                }
            }
        }
        ToolResponse::Analysis(report)
    }

    pub async fn aggregate_news(&self, topic: &str) -> ToolResponse {
        let q = SearchQuery::new(
            format!("{} latest news", topic.trim()),
            Some(self.config.news_results),
        );
        match self.search.search(&q).await {
            Ok(resp) => ToolResponse::News {
                topic: topic.to_string(),
                items: resp
                    .results
                    .into_iter()
                    .take(self.config.news_results)
                    .collect(),
            },
            Err(e) => {
                tracing::warn!(provider = self.search.name(), error = %e, "news search failed");
                ToolResponse::Failed(format!("fetching news for '{topic}' failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted collaborators shared by the tool and orchestrator tests.

    use super::*;
    use crate::SearchResponse;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct FakeSearch {
        pub results: Vec<SearchResult>,
        pub fail: bool,
        pub queries: Mutex<Vec<String>>,
    }

    impl FakeSearch {
        pub fn with_urls(urls: &[&str]) -> Self {
            Self {
                results: urls
                    .iter()
                    .enumerate()
                    .map(|(i, u)| SearchResult {
                        title: format!("Title {i}"),
                        snippet: format!("Snippet {i}"),
                        url: Some(u.to_string()),
                    })
                    .collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl SearchProvider for FakeSearch {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn search(&self, q: &SearchQuery) -> Result<crate::SearchResponse> {
            self.queries.lock().unwrap().push(q.query.clone());
            if self.fail {
                return Err(Error::Search("provider down".to_string()));
            }
            Ok(SearchResponse {
                results: self.results.clone(),
                provider: "fake".to_string(),
                timings_ms: BTreeMap::new(),
            })
        }
    }

    /// Pages keyed by URL; each has a delay and either text or a failure.
    #[derive(Default)]
    pub struct FakeFetcher {
        pub pages: HashMap<String, (u64, std::result::Result<String, String>)>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn page(mut self, url: &str, delay_ms: u64, text: &str) -> Self {
            self.pages
                .insert(url.to_string(), (delay_ms, Ok(text.to_string())));
            self
        }

        pub fn broken(mut self, url: &str, why: &str) -> Self {
            self.pages.insert(url.to_string(), (0, Err(why.to_string())));
            self
        }
    }

    #[async_trait::async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch_text(&self, url: &str, _timeout: Duration) -> Result<String> {
            self.calls.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some((delay, r)) => {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    r.clone().map_err(Error::Fetch)
                }
                None => Err(Error::Fetch(format!("no fixture for {url}"))),
            }
        }
    }

    /// Judge that answers by looking for a marker in the content:
    /// `score=N` yields "Score: N/10", `boom` yields an error.
    #[derive(Default)]
    pub struct MarkerJudge {
        pub calls: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl ChatModel for MarkerJudge {
        fn name(&self) -> &str {
            "marker-judge"
        }

        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            if user.contains("boom") {
                return Err(Error::Llm("judge exploded".to_string()));
            }
            let score = user
                .split("score=")
                .nth(1)
                .and_then(|s| s.chars().take_while(|c| c.is_ascii_digit()).collect::<String>().parse::<u8>().ok())
                .unwrap_or(0);
            Ok(format!(
                "Relevance: Yes\nReliability: Medium\nSummary: marker {score}\nScore: {score}/10"
            ))
        }
    }

    pub fn registry(search: FakeSearch, fetcher: FakeFetcher, config: AgentConfig) -> ToolRegistry {
        ToolRegistry::new(
            Arc::new(search),
            Arc::new(fetcher),
            Arc::new(MarkerJudge::default()),
            config,
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn tool_names_parse_leniently() {
        assert_eq!(ToolName::parse("search-urls"), Some(ToolName::SearchUrls));
        assert_eq!(ToolName::parse(" Fetch_Text "), Some(ToolName::FetchText));
        assert_eq!(ToolName::parse("`analyze-content`"), Some(ToolName::AnalyzeContent));
        assert_eq!(ToolName::parse("aggregate news"), Some(ToolName::AggregateNews));
        assert_eq!(ToolName::parse("browse"), None);
        assert_eq!(ToolName::FetchText.spec().name, ToolName::FetchText);
    }

    #[tokio::test]
    async fn search_urls_lists_provider_urls() {
        let reg = registry(
            FakeSearch::with_urls(&["https://a.example", "https://b.example"]),
            FakeFetcher::default(),
            AgentConfig::default(),
        );
        let out = reg.invoke(ToolName::SearchUrls, "\"rust\"").await;
        assert_eq!(out, r#"["https://a.example","https://b.example"]"#);
    }

    #[tokio::test]
    async fn search_urls_empty_and_failed_provider() {
        let reg = registry(FakeSearch::default(), FakeFetcher::default(), AgentConfig::default());
        assert_eq!(reg.invoke(ToolName::SearchUrls, "nothing").await, "[]");

        let failing = FakeSearch {
            fail: true,
            ..FakeSearch::default()
        };
        let reg = registry(failing, FakeFetcher::default(), AgentConfig::default());
        let out = reg.invoke(ToolName::SearchUrls, "x").await;
        assert!(out.starts_with("Error: searching for 'x' failed"), "{out}");
    }

    #[tokio::test]
    async fn fetch_text_preserves_order_despite_completion_order_and_failures() {
        let fetcher = FakeFetcher::default()
            .page("https://slow.example", 120, "slow text")
            .broken("https://broken.example", "connection refused")
            .page("https://fast.example", 5, "fast text");
        let reg = registry(FakeSearch::default(), fetcher, AgentConfig::default());
        let out = reg
            .invoke(
                ToolName::FetchText,
                r#"["https://slow.example", "https://broken.example", "https://fast.example"]"#,
            )
            .await;
        let texts: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0], "slow text");
        assert!(texts[1].starts_with("[fetch error: https://broken.example"));
        assert!(texts[1].contains("connection refused"));
        assert_eq!(texts[2], "fast text");
    }

    #[tokio::test]
    async fn fetch_text_processes_only_the_first_five() {
        let mut fetcher = FakeFetcher::default();
        let urls: Vec<String> = (0..8).map(|i| format!("https://e{i}.example")).collect();
        for u in &urls {
            fetcher = fetcher.page(u, 0, u);
        }
        let fetcher = Arc::new(fetcher);
        let reg = ToolRegistry::new(
            Arc::new(FakeSearch::default()),
            fetcher.clone(),
            Arc::new(MarkerJudge::default()),
            AgentConfig::default(),
        )
        .unwrap();
        let out = reg
            .invoke(ToolName::FetchText, &serde_json::to_string(&urls).unwrap())
            .await;
        let texts: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(texts, urls[..5].to_vec());
        assert_eq!(fetcher.calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn fetch_text_times_out_one_slot_only() {
        let fetcher = FakeFetcher::default()
            .page("https://hang.example", 5_000, "never")
            .page("https://ok.example", 0, "ok");
        let cfg = AgentConfig {
            fetch_timeout_ms: 50,
            ..AgentConfig::default()
        };
        let reg = registry(FakeSearch::default(), fetcher, cfg);
        let out = reg
            .invoke(ToolName::FetchText, "https://hang.example https://ok.example")
            .await;
        let texts: Vec<String> = serde_json::from_str(&out).unwrap();
        assert!(texts[0].contains("timed out"), "{}", texts[0]);
        assert_eq!(texts[1], "ok");
    }

    #[tokio::test]
    async fn analyze_content_keeps_only_high_scores() {
        let reg = registry(FakeSearch::default(), FakeFetcher::default(), AgentConfig::default());
        let input = serde_json::json!({
            "query": "q",
            "contents": ["first score=8 text", "second score=3 text"]
        })
        .to_string();
        let out = reg.invoke(ToolName::AnalyzeContent, &input).await;
        assert!(out.contains("marker 8"), "{out}");
        assert!(!out.contains("marker 3"), "{out}");
        assert!(out.contains("Source 1 (score 8/10"));
    }

    #[tokio::test]
    async fn analyze_content_fallback_message_and_error_lines() {
        let reg = registry(FakeSearch::default(), FakeFetcher::default(), AgentConfig::default());
        let input = serde_json::json!({
            "query": "q",
            "contents": ["boom", "score=2", ""]
        })
        .to_string();
        let out = reg.invoke(ToolName::AnalyzeContent, &input).await;
        assert!(out.contains("Error analyzing source 1: llm failed: judge exploded"), "{out}");
        assert!(out.contains("none of the 1 analyzed sources scored at least 7/10"), "{out}");
    }

    #[tokio::test]
    async fn analyze_content_never_fails_on_malformed_input() {
        let reg = registry(FakeSearch::default(), FakeFetcher::default(), AgentConfig::default());
        let out = reg
            .invoke(ToolName::AnalyzeContent, "what is rust\nRust page score=9")
            .await;
        assert!(out.contains("marker 9"), "{out}");

        let out = reg.invoke(ToolName::AnalyzeContent, "{not json").await;
        assert!(out.starts_with("No relevant content found"), "{out}");
    }

    #[tokio::test]
    async fn aggregate_news_formats_top_five() {
        let urls: Vec<String> = (0..7).map(|i| format!("https://n{i}.example")).collect();
        let refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();
        let search = Arc::new(FakeSearch::with_urls(&refs));
        let reg = ToolRegistry::new(
            search.clone(),
            Arc::new(FakeFetcher::default()),
            Arc::new(MarkerJudge::default()),
            AgentConfig::default(),
        )
        .unwrap();
        let out = reg.invoke(ToolName::AggregateNews, "AI").await;
        assert_eq!(out.matches("🔹").count(), 5);
        assert!(out.contains("🔗 https://n0.example"));
        assert!(!out.contains("n5.example"));
        assert_eq!(
            search.queries.lock().unwrap().as_slice(),
            &["AI latest news".to_string()]
        );
    }
}
