//! Per-call context: correlation id, cancellation and the diagnostics sink.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Span, info_span, warn};
use uuid::Uuid;

use crate::ExtractError;

/// Where stage artifacts (outline, oracle replies, candidate text) go.
/// Failures are reported to the caller of [`CallContext::record`], which
/// only logs them.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn persist(&self, correlation_id: Uuid, stage: &str, artifact: &str)
    -> std::io::Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl DiagnosticSink for NoopSink {
    async fn persist(&self, _: Uuid, _: &str, _: &str) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writes `<dir>/<correlation_id>/<stage>.txt`.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DiagnosticSink for FileSink {
    async fn persist(
        &self,
        correlation_id: Uuid,
        stage: &str,
        artifact: &str,
    ) -> std::io::Result<()> {
        let dir = self.dir.join(correlation_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(format!("{stage}.txt")), artifact).await
    }
}

/// Everything one extraction call carries through the pipeline.
#[derive(Clone)]
pub struct CallContext {
    correlation_id: Uuid,
    cancel: CancellationToken,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Tie this call to an outside token, e.g. the connection it serves.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Root span of the call; every stage logs inside it.
    pub fn span(&self) -> Span {
        info_span!("extract", correlation_id = %self.correlation_id)
    }

    /// Persist a stage artifact.  Never fails the call.
    pub async fn record(&self, stage: &str, artifact: &str) {
        if let Err(err) = self.sink.persist(self.correlation_id, stage, artifact).await {
            warn!(stage, error = %err, "diagnostic sink unavailable");
        }
    }

    /// Run `fut` unless the call is cancelled first.
    pub async fn guard<T>(&self, fut: impl Future<Output = T>) -> Result<T, ExtractError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ExtractError::Cancelled),
            out = fut => Ok(out),
        }
    }
}
