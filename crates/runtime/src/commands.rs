use serde::{Deserialize, Serialize};

use crate::{ErrorStatus, ExtractionResult};

/// One request line on the daemon socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCommand {
    Extract { prompt: String, url: String },
    Ping,
    Shutdown,
}

/// One response line on the daemon socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerEvent {
    Result(ExtractionResult),
    /// The page was read but does not hold what was asked for.
    NotFound { prompt: String, url: String, message: String },
    /// The call failed; `message` is safe to show to the caller.
    Error { status: ErrorStatus, message: String },
    Pong,
    Ack(String),
}
