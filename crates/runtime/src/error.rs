use serde::{Deserialize, Serialize};
use thiserror::Error;

use pagesift_llm::OracleError;
use pagesift_render::FetchError;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("oracle request failed: {0}")]
    OracleCommunication(#[source] OracleError),
    /// The selector reply held no usable identifiers.  Ends the attempt.
    #[error("selector reply unusable: {0}")]
    OracleResponse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("extraction cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<OracleError> for ExtractError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Configuration(message) => Self::Configuration(message),
            other => Self::OracleCommunication(other),
        }
    }
}

/// What a caller should do about a failed extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    Retryable,
    NotFound,
    Failed,
}

impl ExtractError {
    pub fn status(&self) -> ErrorStatus {
        match self {
            Self::Fetch(_) | Self::OracleCommunication(_) | Self::Cancelled => {
                ErrorStatus::Retryable
            }
            Self::NotFound(_) => ErrorStatus::NotFound,
            Self::OracleResponse(_) | Self::Configuration(_) | Self::Internal(_) => {
                ErrorStatus::Failed
            }
        }
    }

    /// Message safe to hand to an outside caller: no prompts, oracle output
    /// or page content.
    pub fn public_message(&self) -> String {
        match self {
            Self::Fetch(FetchError::Timeout(_)) => "the page took too long to load".to_string(),
            Self::Fetch(FetchError::InvalidUrl(_)) => "the url is not valid".to_string(),
            Self::Fetch(FetchError::Status(code)) => format!("the page returned HTTP {code}"),
            Self::Fetch(_) => "the page could not be fetched".to_string(),
            Self::OracleCommunication(_) => "the reasoning service is unavailable".to_string(),
            Self::NotFound(_) => "the requested information was not found on the page".to_string(),
            Self::Cancelled => "the extraction was cancelled".to_string(),
            Self::Configuration(_) => "the service is misconfigured".to_string(),
            Self::OracleResponse(_) | Self::Internal(_) => "the extraction failed".to_string(),
        }
    }
}
