use crate::{clip_chars, ChatModel, Result};
use serde::Serialize;
use std::sync::OnceLock;

const JUDGE_SYSTEM: &str = "You are a careful research assistant. You assess web content \
for relevance and reliability. Answer in the exact format requested.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reliability {
    High,
    Medium,
    Low,
}

impl Reliability {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub relevant: bool,
    pub reliability: Option<Reliability>,
    pub summary: String,
    /// Usefulness out of 10; 0 when the judge gave no parseable score.
    pub score: u8,
    /// The judge's full response, rendered back to the reasoner.
    pub raw: String,
}

pub fn judge_prompt(query: &str, content: &str) -> String {
    format!(
        "Query: {query}\n\n\
         Content:\n{content}\n\n\
         Assess the content above for the query.\n\
         Relevance: Yes or No\n\
         Reliability: High, Medium or Low\n\
         Summary: a summary of the content in 4 lines\n\
         Score: N/10 (how useful the content is for answering the query)"
    )
}

fn relevance_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?i)relevan\w*\W{0,10}(yes|no)\b").expect("static relevance regex")
    })
}

fn reliability_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?i)reliab\w*\W{0,10}(high|medium|low)\b")
            .expect("static reliability regex")
    })
}

fn summary_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?is)summary\W{0,5}(.*?)(?:\n\s*\W{0,4}(?:score|usefulness)\b|\z)")
            .expect("static summary regex")
    })
}

/// Score out of 10 from `text`, or 0 when `score_re` does not match.
pub fn extract_score(text: &str, score_re: &regex::Regex) -> u8 {
    score_re
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .map(|n| n.min(10))
        .unwrap_or(0)
}

pub fn parse_assessment(text: &str, score_re: &regex::Regex) -> Assessment {
    let relevant = relevance_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    let reliability = reliability_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| Reliability::parse(m.as_str()));
    let summary = summary_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| text.trim().to_string());
    Assessment {
        relevant,
        reliability,
        summary,
        score: extract_score(text, score_re),
        raw: text.trim().to_string(),
    }
}

/// The relevance/reliability judge: one model call per (query, content) pair.
pub struct Assessor<M> {
    model: M,
    score_re: regex::Regex,
    max_content_chars: usize,
}

impl<M: ChatModel> Assessor<M> {
    pub fn new(model: M, score_re: regex::Regex, max_content_chars: usize) -> Self {
        Self {
            model,
            score_re,
            max_content_chars,
        }
    }

    pub async fn assess(&self, query: &str, content: &str) -> Result<Assessment> {
        let prompt = judge_prompt(query, clip_chars(content, self.max_content_chars));
        let text = self.model.complete(JUDGE_SYSTEM, &prompt).await?;
        tracing::debug!(model = self.model.name(), chars = text.len(), "judge responded");
        Ok(parse_assessment(&text, &self.score_re))
    }
}
