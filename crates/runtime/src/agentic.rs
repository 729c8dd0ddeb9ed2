//! Snapshot-driven query loop.
//!
//! ```text
//! QUERYING ──DONE──────────▶ result
//!    │  ▲  ──NOTFOUND──────▶ ExtractError::NotFound
//!    ▼  │
//!   SEARCH  (window doubles; after `max_attempts` queries ▶ NotFound)
//! ```
//!
//! A reply that carries no recognisable state ends the loop as `DONE` with
//! the reply wrapped as [`Outcome::Raw`].

use std::fmt;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use pagesift_dom::{NormalizedLine, render_snapshot, truncate_chars};
use pagesift_llm::{Oracle, find_json_object};

use crate::prompts::agentic_prompt;
use crate::{CallContext, ExtractError, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Querying,
    Done,
    NotFound,
    Search,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Querying => "QUERYING",
            Self::Done => "DONE",
            Self::NotFound => "NOTFOUND",
            Self::Search => "SEARCH",
        })
    }
}

impl AgentState {
    fn parse(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "QUERYING" => Some(Self::Querying),
            "DONE" => Some(Self::Done),
            "NOTFOUND" => Some(Self::NotFound),
            "SEARCH" => Some(Self::Search),
            _ => None,
        }
    }
}

/// One oracle reply, read as a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub state: AgentState,
    pub result: Option<Outcome>,
}

impl AgentReply {
    /// Read `{"state": ..., "result": ...}` out of a reply.  An object
    /// `result` is structured, a string `result` is raw text.  Replies with
    /// no object or no known state become `DONE` with the whole reply raw.
    pub fn parse(reply: &str) -> Self {
        let raw_done = || Self {
            state: AgentState::Done,
            result: Some(Outcome::Raw {
                raw: reply.to_string(),
            }),
        };
        let Some(map) = find_json_object(reply) else {
            return raw_done();
        };
        let Some(state) = map.get("state").and_then(Value::as_str).and_then(AgentState::parse)
        else {
            return raw_done();
        };
        let result = match map.get("result") {
            Some(Value::Object(result)) => Some(Outcome::Structured(result.clone())),
            Some(Value::String(text)) => Some(Outcome::Raw { raw: text.clone() }),
            _ => None,
        };
        Self { state, result }
    }
}

/// Knobs for one session.
#[derive(Debug, Clone, Copy)]
pub struct AgenticOptions {
    pub max_attempts: usize,
    pub initial_window_chars: usize,
}

/// One run of the loop over a single page.  The rendered snapshot is built
/// once and reused by every query of the session.
pub struct AgenticSession<'a> {
    oracle: &'a dyn Oracle,
    ctx: &'a CallContext,
    snapshot: String,
    options: AgenticOptions,
}

impl<'a> AgenticSession<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        ctx: &'a CallContext,
        lines: &[NormalizedLine],
        options: AgenticOptions,
    ) -> Self {
        Self {
            oracle,
            ctx,
            snapshot: render_snapshot(lines),
            options,
        }
    }

    fn window(&self, attempt: usize) -> &str {
        let factor = 1usize
            .checked_shl(attempt.saturating_sub(1) as u32)
            .unwrap_or(usize::MAX);
        let chars = self.options.initial_window_chars.saturating_mul(factor);
        truncate_chars(&self.snapshot, chars)
    }

    #[instrument(skip_all, fields(snapshot_len = self.snapshot.len()))]
    pub async fn run(&self, task: &str) -> Result<Outcome, ExtractError> {
        self.ctx.record("snapshot", &self.snapshot).await;
        let mut state = AgentState::Querying;

        for attempt in 1..=self.options.max_attempts.max(1) {
            let window = self.window(attempt);
            let truncated = window.len() < self.snapshot.len();
            let prompt = agentic_prompt(task, window, attempt, truncated);
            let reply = self.ctx.guard(self.oracle.complete(&prompt)).await??;
            self.ctx
                .record(&format!("agent_reply_{attempt}"), &reply)
                .await;

            let AgentReply { state: next, result } = AgentReply::parse(&reply);
            debug!(attempt, from = %state, to = %next, "agent transition");
            state = next;

            match state {
                AgentState::Done => {
                    info!(attempt, "agent finished");
                    return Ok(result.unwrap_or(Outcome::Raw { raw: reply }));
                }
                AgentState::NotFound => {
                    return Err(ExtractError::NotFound(
                        "oracle reported the information absent".to_string(),
                    ));
                }
                AgentState::Search | AgentState::Querying if !truncated => {
                    warn!(attempt, "search requested but the whole page was already shown");
                    return Err(ExtractError::NotFound(
                        "search requested with no further context available".to_string(),
                    ));
                }
                AgentState::Search | AgentState::Querying => {
                    info!(attempt, "widening the snapshot window");
                }
            }
        }

        Err(ExtractError::NotFound(format!(
            "no answer after {} attempts",
            self.options.max_attempts.max(1)
        )))
    }
}
