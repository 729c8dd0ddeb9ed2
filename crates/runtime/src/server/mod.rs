//! Unix-socket daemon: one JSON line in, one JSON line out per connection.

mod connection;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::Extractor;

/// Serve extraction requests on `socket_path` until `shutdown` fires or a
/// client sends `Shutdown`.  In-flight extractions are cancelled on the way
/// out.
pub async fn run_server(
    extractor: Arc<Extractor>,
    socket_path: impl AsRef<Path>,
    shutdown: CancellationToken,
) -> Result<()> {
    let socket_path = socket_path.as_ref().to_path_buf();
    if socket_path.exists() {
        let _ = std::fs::remove_file(&socket_path);
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    info!(socket = %socket_path.display(), "daemon listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("daemon shutdown requested");
                break;
            }
            accept = listener.accept() => {
                let (stream, _) = accept?;
                let extractor = extractor.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(err) = connection::handle_connection(stream, extractor, shutdown).await {
                        error!(?err, "connection handling failed");
                    }
                });
            }
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use pagesift_config::ExtractionConfig;
    use pagesift_llm::{Oracle, OracleError};
    use pagesift_render::{FetchError, RawDocument, Renderer};
    use serde_json::json;
    use url::Url;

    use crate::{DaemonClient, ErrorStatus, ServerEvent};

    struct Heading;

    #[async_trait]
    impl Renderer for Heading {
        async fn fetch(&self, url: &Url, _render_js: bool) -> Result<RawDocument, FetchError> {
            if url.host_str() == Some("missing.test") {
                return Err(FetchError::Status(404));
            }
            Ok(RawDocument::AccessibilityTree(
                json!({"role": "heading", "name": "Schedule"}),
            ))
        }
    }

    /// Picks the heading, then answers with its text.
    struct TwoStep;

    #[async_trait]
    impl Oracle for TwoStep {
        async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
            if prompt.contains("PAGE OUTLINE") {
                Ok(r#"[{"tag": "heading"}]"#.to_string())
            } else if prompt.contains("nothing here") {
                Ok(r#"{"state": "NOTFOUND"}"#.to_string())
            } else {
                Ok(r#"{"input": "q", "output": "Schedule"}"#.to_string())
            }
        }
    }

    async fn start(
        strategy: pagesift_config::Strategy,
    ) -> (tempfile::TempDir, DaemonClient, CancellationToken) {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("pagesift.sock");
        let extractor = Arc::new(Extractor::new(
            Arc::new(Heading),
            Arc::new(TwoStep),
            ExtractionConfig {
                strategy,
                ..ExtractionConfig::default()
            },
        ));
        let shutdown = CancellationToken::new();
        tokio::spawn(run_server(extractor, socket.clone(), shutdown.clone()));

        let client = DaemonClient::new(&socket);
        client.connect_with_backoff(20).await.unwrap();
        (dir, client, shutdown)
    }

    #[tokio::test]
    async fn serves_extractions_and_pings() {
        let (_dir, client, shutdown) = start(pagesift_config::Strategy::TwoPass).await;
        client.ping().await.unwrap();

        let event = client.extract("q", "https://example.com").await.unwrap();
        let ServerEvent::Result(result) = event else {
            panic!("expected a result, got {event:?}");
        };
        assert_eq!(result.result.output(), Some(&json!("Schedule")));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn failures_carry_a_status_and_a_safe_message() {
        let (_dir, client, shutdown) = start(pagesift_config::Strategy::TwoPass).await;
        let event = client.extract("q", "https://missing.test/").await.unwrap();
        assert_eq!(
            event,
            ServerEvent::Error {
                status: ErrorStatus::Retryable,
                message: "the page returned HTTP 404".into()
            }
        );
        shutdown.cancel();
    }

    #[tokio::test]
    async fn not_found_is_its_own_payload() {
        let (_dir, client, shutdown) = start(pagesift_config::Strategy::Agentic).await;
        let event = client.extract("nothing here", "https://example.com").await.unwrap();
        assert!(matches!(event, ServerEvent::NotFound { .. }), "{event:?}");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn shutdown_command_stops_the_daemon() {
        let (dir, client, _shutdown) = start(pagesift_config::Strategy::TwoPass).await;
        client.shutdown().await.unwrap();
        let socket = dir.path().join("pagesift.sock");
        for _ in 0..50 {
            if !socket.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("socket still present after shutdown");
    }
}
