//! The extraction pipeline: section selection, synthesis, the orchestrator
//! and its strategies, plus the unix-socket daemon that serves it.

pub mod agentic;
mod client;
mod commands;
mod context;
mod error;
mod orchestrator;
pub mod prompts;
pub mod selector;
mod server;
pub mod synthesizer;

pub use agentic::{AgentState, AgenticOptions, AgenticSession};
pub use client::DaemonClient;
pub use commands::{ClientCommand, ServerEvent};
pub use context::{CallContext, DiagnosticSink, FileSink, NoopSink};
pub use error::{ErrorStatus, ExtractError};
pub use orchestrator::{ExtractionResult, Extractor, LoadedPage};
pub use selector::{Selection, parse_selection, select_sections};
pub use server::run_server;
pub use synthesizer::{Outcome, synthesize};
