use crate::{Error, Result};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_SCORE_PATTERN: &str = r"(?i)score\D{0,40}?(\d{1,2})\s*/\s*10";

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env(key).and_then(|s| s.parse::<T>().ok())
}

/// Knobs for routing, the reason-act loop and the tool contracts.
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    /// Hard ceiling on reason-act steps for one query.
    pub max_steps: usize,
    /// fetch-text processes at most this many URLs.
    pub max_fetch_urls: usize,
    pub fetch_timeout_ms: u64,
    /// analyze-content keeps assessments scoring at least this.
    pub min_score: u8,
    /// Regex with one capture group holding the N of "score ... N/10".
    pub score_pattern: String,
    /// Lowercase phrases that route a query to the news shortcut.
    pub news_phrases: Vec<String>,
    pub news_results: usize,
    pub search_results: usize,
    pub max_judge_chars: usize,
    pub max_observation_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_fetch_urls: 5,
            fetch_timeout_ms: 5_000,
            min_score: 7,
            score_pattern: DEFAULT_SCORE_PATTERN.to_string(),
            news_phrases: vec!["latest news".to_string(), "recent news".to_string()],
            news_results: 5,
            search_results: 10,
            max_judge_chars: 6_000,
            max_observation_chars: 4_000,
        }
    }
}

impl AgentConfig {
    /// Defaults overridden by `WEBSCOUT_*` environment variables.
    ///
    /// Unparseable values are ignored (the default stays); call [`validate`](Self::validate)
    /// to reject combinations that cannot work.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(n) = env_parse("WEBSCOUT_MAX_STEPS") {
            cfg.max_steps = n;
        }
        if let Some(n) = env_parse("WEBSCOUT_MAX_FETCH_URLS") {
            cfg.max_fetch_urls = n;
        }
        if let Some(n) = env_parse("WEBSCOUT_FETCH_TIMEOUT_MS") {
            cfg.fetch_timeout_ms = n;
        }
        if let Some(n) = env_parse("WEBSCOUT_MIN_SCORE") {
            cfg.min_score = n;
        }
        if let Some(p) = env("WEBSCOUT_SCORE_PATTERN") {
            cfg.score_pattern = p;
        }
        if let Some(v) = env("WEBSCOUT_NEWS_PHRASES") {
            let phrases: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !phrases.is_empty() {
                cfg.news_phrases = phrases;
            }
        }
        if let Some(n) = env_parse("WEBSCOUT_NEWS_RESULTS") {
            cfg.news_results = n;
        }
        if let Some(n) = env_parse("WEBSCOUT_SEARCH_RESULTS") {
            cfg.search_results = n;
        }
        if let Some(n) = env_parse("WEBSCOUT_MAX_JUDGE_CHARS") {
            cfg.max_judge_chars = n;
        }
        if let Some(n) = env_parse("WEBSCOUT_MAX_OBSERVATION_CHARS") {
            cfg.max_observation_chars = n;
        }
        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::InvalidConfig("max_steps must be at least 1".to_string()));
        }
        if self.max_fetch_urls == 0 {
            return Err(Error::InvalidConfig(
                "max_fetch_urls must be at least 1".to_string(),
            ));
        }
        if self.min_score > 10 {
            return Err(Error::InvalidConfig(format!(
                "min_score must be within 0..=10 (got {})",
                self.min_score
            )));
        }
        self.score_regex().map(|_| ())
    }

    pub fn score_regex(&self) -> Result<regex::Regex> {
        let re = regex::Regex::new(&self.score_pattern)
            .map_err(|e| Error::InvalidConfig(format!("score_pattern: {e}")))?;
        if re.captures_len() < 2 {
            return Err(Error::InvalidConfig(
                "score_pattern needs a capture group for the score".to_string(),
            ));
        }
        Ok(re)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn is_news_query(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.news_phrases
            .iter()
            .any(|p| !p.is_empty() && q.contains(&p.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AgentConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_steps_and_groupless_pattern() {
        let cfg = AgentConfig {
            max_steps: 0,
            ..AgentConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let cfg = AgentConfig {
            score_pattern: r"score \d+/10".to_string(),
            ..AgentConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn news_routing_is_case_insensitive() {
        let cfg = AgentConfig::default();
        assert!(cfg.is_news_query("AI Latest News"));
        assert!(cfg.is_news_query("any RECENT NEWS on rust?"));
        assert!(!cfg.is_news_query("What are the symptoms of diabetes?"));
        assert!(!cfg.is_news_query(""));
    }
}
