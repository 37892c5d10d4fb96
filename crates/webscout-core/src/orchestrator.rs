//! Per-query routing and the bounded reason-act loop.
//!
//! ```text
//! Routing ──news phrase──▶ Shortcut ──▶ Done
//!    └────otherwise─────▶ Looping (≤ max_steps) ──▶ Done
//! ```

use crate::reason::{NextAction, Reasoner, ReasoningContext};
use crate::tools::{ToolName, ToolRegistry, ToolRequest};
use crate::{clip_chars, Result};
use serde::Serialize;
use std::time::Instant;

/// One recorded tool call. Fields are fixed once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    tool: ToolName,
    raw_input: String,
    raw_output: String,
}

impl ToolInvocation {
    pub fn new(tool: ToolName, raw_input: impl Into<String>, raw_output: impl Into<String>) -> Self {
        Self {
            tool,
            raw_input: raw_input.into(),
            raw_output: raw_output.into(),
        }
    }

    pub fn tool(&self) -> ToolName {
        self.tool
    }

    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    /// Reasoning the model gave alongside an action.
    Thought,
    /// Something the loop itself observed (e.g. unparseable model output).
    Diagnostic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Invocation(ToolInvocation),
    Note { kind: NoteKind, text: String },
}

/// Append-only record of one query execution.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn invocations(&self) -> impl DoubleEndedIterator<Item = &ToolInvocation> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::Invocation(inv) => Some(inv),
            TranscriptEntry::Note { .. } => None,
        })
    }

    pub fn record(&mut self, inv: ToolInvocation) {
        self.entries.push(TranscriptEntry::Invocation(inv));
    }

    pub fn note(&mut self, kind: NoteKind, text: impl Into<String>) {
        self.entries.push(TranscriptEntry::Note {
            kind,
            text: text.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Shortcut,
    Looping,
}

/// What the UI layer receives for one query.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub answer: String,
    /// Side channel: the digest on the shortcut path, empty otherwise.
    pub news: Vec<String>,
    pub route: Route,
    /// Reason-act steps taken (0 on the shortcut path).
    pub steps: usize,
    /// True when the step ceiling was hit before a final answer.
    pub exhausted: bool,
}

pub struct Orchestrator<R> {
    tools: ToolRegistry,
    reasoner: R,
}

impl<R: Reasoner> Orchestrator<R> {
    pub fn new(tools: ToolRegistry, reasoner: R) -> Self {
        Self { tools, reasoner }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn route(&self, query: &str) -> Route {
        if self.tools.config().is_news_query(query) {
            Route::Shortcut
        } else {
            Route::Looping
        }
    }

    /// Answer `query`. Never fails: errors come back as an `Error: ...` answer.
    pub async fn run(&self, query: &str) -> RunOutcome {
        match self.try_run(query).await {
            Ok(out) => out,
            Err(e) => {
                tracing::error!(error = %e, "run failed");
                RunOutcome {
                    answer: format!("Error: {e}"),
                    news: Vec::new(),
                    route: self.route(query),
                    steps: 0,
                    exhausted: false,
                }
            }
        }
    }

    pub async fn try_run(&self, query: &str) -> Result<RunOutcome> {
        let t0 = Instant::now();
        let route = self.route(query);
        let out = match route {
            Route::Shortcut => self.shortcut(query).await,
            Route::Looping => self.reason_act(query).await?,
        };
        tracing::info!(
            route = ?out.route,
            steps = out.steps,
            exhausted = out.exhausted,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "run finished"
        );
        Ok(out)
    }

    async fn shortcut(&self, query: &str) -> RunOutcome {
        let digest = self
            .tools
            .execute(ToolRequest::AggregateNews {
                topic: query.to_string(),
            })
            .await
            .render();
        RunOutcome {
            answer: digest.clone(),
            news: vec![digest],
            route: Route::Shortcut,
            steps: 0,
            exhausted: false,
        }
    }

    async fn reason_act(&self, query: &str) -> Result<RunOutcome> {
        let max_steps = self.tools.config().max_steps;
        let done = |answer: String, steps: usize, exhausted: bool| RunOutcome {
            answer,
            news: Vec::new(),
            route: Route::Looping,
            steps,
            exhausted,
        };
        if query.trim().is_empty() {
            return Ok(done(
                "No relevant content found: the query is empty.".to_string(),
                0,
                false,
            ));
        }

        let mut transcript = Transcript::default();
        for step in 0..max_steps {
            let ctx = ReasoningContext {
                query,
                tools: self.tools.specs(),
                transcript: &transcript,
                step,
                max_steps,
            };
            match self.reasoner.next_action(&ctx).await? {
                NextAction::Final { answer } => {
                    return Ok(done(answer, step + 1, false));
                }
                NextAction::Tool {
                    tool,
                    input,
                    thought,
                } => {
                    if let Some(thought) = thought {
                        transcript.note(NoteKind::Thought, thought);
                    }
                    tracing::debug!(step, tool = %tool, "invoking tool");
                    let output = self.tools.invoke(tool, &input).await;
                    transcript.record(ToolInvocation::new(tool, input, output));
                }
                NextAction::ParseFailure { diagnostic, .. } => {
                    tracing::debug!(step, %diagnostic, "unparseable reasoner output");
                    transcript.note(
                        NoteKind::Diagnostic,
                        format!("Invalid or incomplete response: {diagnostic}"),
                    );
                }
            }
        }

        tracing::warn!(max_steps, "step ceiling reached without a final answer");
        Ok(done(
            self.partial_answer(query, &transcript, max_steps),
            max_steps,
            true,
        ))
    }

    /// Best effort once the ceiling is hit: the latest analysis if any,
    /// otherwise the latest non-error observation.
    fn partial_answer(&self, query: &str, transcript: &Transcript, steps: usize) -> String {
        let useful = |inv: &&ToolInvocation| {
            let out = inv.raw_output().trim();
            !out.is_empty() && out != "[]" && !out.starts_with("Error:")
        };
        let best = transcript
            .invocations()
            .rev()
            .filter(useful)
            .find(|inv| inv.tool() == ToolName::AnalyzeContent)
            .or_else(|| transcript.invocations().rev().find(useful));
        match best {
            Some(inv) => format!(
                "I could not reach a final answer within {steps} reasoning steps. \
                 Best findings so far (from {}):\n{}",
                inv.tool(),
                clip_chars(inv.raw_output(), self.tools.config().max_observation_chars)
            ),
            None => format!(
                "No relevant content found for '{query}' within {steps} reasoning steps."
            ),
        }
    }
}
