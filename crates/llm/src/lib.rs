//! Reasoning-oracle clients and defensive parsing of their replies.

mod client;
mod json;
mod retry;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{LlmRouter, OllamaClient, OpenRouterClient, Provider};
pub use json::{find_json_array, find_json_object, parse_json_object};
pub use retry::WithRetry;

/// A text-completion service.  Nothing about the reply is guaranteed:
/// callers parse it defensively.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request timed out after {0:?}")]
    Timeout(Duration),
    #[error("oracle unreachable: {0}")]
    Network(String),
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle response missing completion text: {0}")]
    MalformedResponse(String),
    #[error("oracle misconfigured: {0}")]
    Configuration(String),
}

impl OracleError {
    /// Failures worth another attempt: connection problems, timeouts,
    /// rate limiting and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse(_) | Self::Configuration(_) => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err.to_string())
        }
    }
}
