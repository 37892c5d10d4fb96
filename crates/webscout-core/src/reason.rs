//! The reasoning capability behind the reason-act loop.
//!
//! [`LlmReasoner`] speaks a ReAct-style text protocol with a [`ChatModel`]:
//! the model either picks a tool (`Action:` / `Action Input:`) or ends the
//! loop (`Final Answer:`). Anything else is a [`NextAction::ParseFailure`],
//! which the orchestrator records and moves past.

use crate::orchestrator::{NoteKind, Transcript, TranscriptEntry};
use crate::tools::{ToolName, ToolSpec};
use crate::{clip_chars, ChatModel, Result};
use std::fmt::Write as _;
use std::sync::OnceLock;

const REACT_SYSTEM: &str = "You are a web research agent. Answer the user's question as \
accurately as possible by searching the web, reading pages and judging their reliability. \
Prefer reliable sources and say so when the evidence is weak. Follow the response format exactly.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    Tool {
        tool: ToolName,
        input: String,
        thought: Option<String>,
    },
    Final {
        answer: String,
    },
    ParseFailure {
        diagnostic: String,
        raw: String,
    },
}

/// Everything a reasoner may look at when choosing the next step.
pub struct ReasoningContext<'a> {
    pub query: &'a str,
    pub tools: &'a [ToolSpec],
    pub transcript: &'a Transcript,
    /// 0-based index of the step being decided.
    pub step: usize,
    pub max_steps: usize,
}

#[async_trait::async_trait]
pub trait Reasoner: Send + Sync {
    /// Decide the next step. `Err` means the reasoner itself is unavailable
    /// (e.g. the model endpoint failed); malformed model output is not an error.
    async fn next_action(&self, ctx: &ReasoningContext<'_>) -> Result<NextAction>;
}

fn action_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?im)^[ \t*]*action[ \t*]*:[ \t*]*(.*?)[ \t*]*$").expect("static action regex")
    })
}

fn action_input_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?ims)^[ \t*]*action[ \t]*input[ \t*]*:(.*)\z").expect("static action input regex")
    })
}

fn final_answer_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?is)final[ \t]*answer[ \t*]*:(.*)\z").expect("static final answer regex")
    })
}

fn thought_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?im)^[ \t*]*thought[ \t*]*:[ \t*]*(.+?)[ \t]*$").expect("static thought regex")
    })
}

fn observation_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"(?im)^[ \t*]*observation[ \t*]*:").expect("static observation regex")
    })
}

fn strip_fences(s: &str) -> &str {
    let t = s.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return crate::lenient::strip_quotes(t);
    };
    // Drop the info string (```json) and the closing fence.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

fn tool_list() -> String {
    ToolName::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Interpret one model response.
pub fn parse_react(text: &str) -> NextAction {
    // Models sometimes continue past their action and invent the observation.
    let text = match observation_re().find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };
    let failure = |diagnostic: String| NextAction::ParseFailure {
        diagnostic,
        raw: text.trim().to_string(),
    };

    let action = action_re().captures(text);
    // Without a "Thought:" label, whatever precedes the action is the thought.
    let thought = thought_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .or_else(|| {
            let start = action.as_ref()?.get(0)?.start();
            Some(text[..start].trim().to_string())
        })
        .filter(|s| !s.is_empty());
    let action = action.and_then(|c| c.get(1));
    let final_answer = final_answer_re().captures(text).and_then(|c| c.get(1));

    match (action, final_answer) {
        (Some(_), Some(_)) => failure(
            "the response contains both an action and a final answer; reply with exactly one"
                .to_string(),
        ),
        (Some(action), None) => {
            let name = action.as_str().trim();
            let Some(tool) = ToolName::parse(name) else {
                return failure(format!(
                    "'{name}' is not a valid tool, try one of [{}]",
                    tool_list()
                ));
            };
            let after_action = &text[action.end()..];
            let Some(input) = action_input_re().captures(after_action).and_then(|c| c.get(1)) else {
                return failure(format!("missing 'Action Input:' after 'Action: {tool}'"));
            };
            NextAction::Tool {
                tool,
                input: strip_fences(input.as_str()).to_string(),
                thought,
            }
        }
        (None, Some(answer)) => {
            let answer = answer.as_str().trim();
            if answer.is_empty() {
                failure("the final answer is empty".to_string())
            } else {
                NextAction::Final {
                    answer: answer.to_string(),
                }
            }
        }
        (None, None) => failure(
            "could not parse the response: expected 'Action:' with 'Action Input:', or 'Final Answer:'"
                .to_string(),
        ),
    }
}

/// Prompt for the next step: tool contracts, format, question and scratchpad.
pub fn render_prompt(ctx: &ReasoningContext<'_>, max_observation_chars: usize) -> String {
    let mut out = String::new();
    out.push_str("You have access to the following tools:\n\n");
    for spec in ctx.tools {
        let _ = writeln!(
            out,
            "{}: {}\n  input: {}\n  output: {}",
            spec.name, spec.description, spec.input, spec.output
        );
    }
    let _ = write!(
        out,
        "\nUse the following format:\n\n\
         Question: the input question you must answer\n\
         Thought: you should always think about what to do\n\
         Action: the action to take, one of [{}]\n\
         Action Input: the input to the action\n\
         Observation: the result of the action\n\
         ... (this Thought/Action/Action Input/Observation can repeat)\n\
         Thought: I now know the final answer\n\
         Final Answer: the final answer to the original input question\n\n\
         You have {} step(s) left.\n\n\
         Question: {}\n",
        tool_list(),
        ctx.max_steps.saturating_sub(ctx.step),
        ctx.query
    );
    for entry in ctx.transcript.entries() {
        match entry {
            TranscriptEntry::Note {
                kind: NoteKind::Thought,
                text,
            } => {
                let _ = writeln!(out, "Thought: {text}");
            }
            TranscriptEntry::Note {
                kind: NoteKind::Diagnostic,
                text,
            } => {
                let _ = writeln!(out, "Observation: {text}");
            }
            TranscriptEntry::Invocation(inv) => {
                let _ = writeln!(
                    out,
                    "Action: {}\nAction Input: {}\nObservation: {}",
                    inv.tool(),
                    inv.raw_input(),
                    clip_chars(inv.raw_output(), max_observation_chars)
                );
            }
        }
    }
    out.push_str("Thought:");
    out
}

pub struct LlmReasoner<M> {
    model: M,
    max_observation_chars: usize,
}

impl<M: ChatModel> LlmReasoner<M> {
    pub fn new(model: M, max_observation_chars: usize) -> Self {
        Self {
            model,
            max_observation_chars,
        }
    }
}

#[async_trait::async_trait]
impl<M: ChatModel> Reasoner for LlmReasoner<M> {
    async fn next_action(&self, ctx: &ReasoningContext<'_>) -> Result<NextAction> {
        let prompt = render_prompt(ctx, self.max_observation_chars);
        let text = self.model.complete(REACT_SYSTEM, &prompt).await?;
        tracing::trace!(model = self.model.name(), step = ctx.step, response = %text, "reasoner output");
        Ok(parse_react(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::ToolInvocation;
    use crate::tools::TOOL_SPECS;

    #[test]
    fn parses_action_with_multiline_input() {
        let out = parse_react(
            "Thought: I should read the pages.\nAction: fetch-text\nAction Input: [\"https://a.example\",\n \"https://b.example\"]",
        );
        assert_eq!(
            out,
            NextAction::Tool {
                tool: ToolName::FetchText,
                input: "[\"https://a.example\",\n \"https://b.example\"]".to_string(),
                thought: Some("I should read the pages.".to_string()),
            }
        );
    }

    #[test]
    fn drops_hallucinated_observation_and_strips_quotes() {
        let out = parse_react("Action: search_urls\nAction Input: \"rust traits\"\nObservation: [\"made up\"]\nFinal Answer: nope");
        assert_eq!(
            out,
            NextAction::Tool {
                tool: ToolName::SearchUrls,
                input: "rust traits".to_string(),
                thought: None,
            }
        );
    }

    #[test]
    fn parses_fenced_input() {
        let out = parse_react("Action: analyze-content\nAction Input: ```json\n{\"query\":\"q\",\"contents\":[\"x\"]}\n```");
        match out {
            NextAction::Tool { input, .. } => assert_eq!(input, "{\"query\":\"q\",\"contents\":[\"x\"]}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_final_answer() {
        let out = parse_react("Thought: I now know the final answer\nFinal Answer: Rust is fast.\nAnd safe.");
        assert_eq!(
            out,
            NextAction::Final {
                answer: "Rust is fast.\nAnd safe.".to_string()
            }
        );
    }

    #[test]
    fn malformed_outputs_are_parse_failures() {
        for text in [
            "I think I will search.",
            "Action: browse\nAction Input: x",
            "Action: search-urls",
            "Action: search-urls\nAction Input: x\nFinal Answer: y",
            "Final Answer:   ",
        ] {
            assert!(
                matches!(parse_react(text), NextAction::ParseFailure { .. }),
                "{text}"
            );
        }
        match parse_react("Action: browse\nAction Input: x") {
            NextAction::ParseFailure { diagnostic, .. } => {
                assert!(diagnostic.contains("'browse' is not a valid tool"));
                assert!(diagnostic.contains("search-urls"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prompt_lists_tools_and_replays_transcript() {
        let mut t = Transcript::default();
        t.note(NoteKind::Thought, "look it up");
        t.record(ToolInvocation::new(
            ToolName::SearchUrls,
            "rust",
            "[\"https://www.rust-lang.org\"]",
        ));
        t.note(NoteKind::Diagnostic, "bad format");
        let ctx = ReasoningContext {
            query: "what is rust",
            tools: &TOOL_SPECS,
            transcript: &t,
            step: 2,
            max_steps: 5,
        };
        let p = render_prompt(&ctx, 10);
        for spec in TOOL_SPECS.iter() {
            assert!(p.contains(spec.name.as_str()));
        }
        assert!(p.contains("Question: what is rust\n"));
        assert!(p.contains("Thought: look it up\nAction: search-urls\nAction Input: rust\nObservation: [\"https://\n"));
        assert!(p.contains("Observation: bad format\n"));
        assert!(p.contains("You have 3 step(s) left."));
        assert!(p.ends_with("Thought:"));
    }
}
