//! Final answer synthesis.  Malformed oracle output never fails this stage:
//! anything that is not a JSON object comes back as [`Outcome::Raw`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use pagesift_dom::{StructuredElement, serialize_bounded};
use pagesift_llm::{Oracle, parse_json_object};

use crate::prompts::synthesis_prompt;
use crate::{CallContext, ExtractError};

/// The `result` of an extraction: the oracle's object, or its verbatim
/// reply wrapped as `{"raw": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Structured(Map<String, Value>),
    Raw { raw: String },
}

impl Outcome {
    /// Strict object parse of `reply`, falling back to the raw wrapper.
    pub fn from_reply(reply: &str) -> Self {
        match parse_json_object(reply) {
            Some(map) => Self::Structured(map),
            None => Self::Raw {
                raw: reply.to_string(),
            },
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }

    /// The `output` field of a structured answer.
    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Structured(map) => map.get("output"),
            Self::Raw { .. } => None,
        }
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        if map.len() == 1 {
            if let Some(Value::String(raw)) = map.get("raw") {
                return Ok(Self::Raw { raw: raw.clone() });
            }
        }
        Ok(Self::Structured(map))
    }
}

#[instrument(skip_all, fields(candidate_len = candidate.len(), elements = elements.len()))]
pub async fn synthesize(
    oracle: &dyn Oracle,
    ctx: &CallContext,
    task: &str,
    candidate: &str,
    elements: &[StructuredElement],
    max_structured_chars: usize,
) -> Result<Outcome, ExtractError> {
    let bounded = serialize_bounded(elements, max_structured_chars);
    if bounded.omitted > 0 {
        info!(
            included = bounded.included,
            omitted = bounded.omitted,
            "structured element list truncated"
        );
    }
    let prompt = synthesis_prompt(task, candidate, &bounded.json, bounded.omitted);
    let reply = ctx.guard(oracle.complete(&prompt)).await??;
    ctx.record("synthesis_reply", &reply).await;

    let outcome = Outcome::from_reply(&reply);
    if outcome.is_raw() {
        warn!(reply_len = reply.len(), "synthesis reply is not a JSON object; returning raw text");
    }
    Ok(outcome)
}
