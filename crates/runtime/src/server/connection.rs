//! Per-connection command dispatch.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{ClientCommand, ErrorStatus, ExtractError, Extractor, ServerEvent};

pub(super) async fn handle_connection(
    stream: UnixStream,
    extractor: Arc<Extractor>,
    shutdown: CancellationToken,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }

    let command: ClientCommand = match serde_json::from_str(line.trim()) {
        Ok(command) => command,
        Err(err) => {
            warn!(%err, "malformed command");
            let event = ServerEvent::Error {
                status: ErrorStatus::Failed,
                message: "malformed command".to_string(),
            };
            return send_event(&mut write_half, event).await;
        }
    };

    match command {
        ClientCommand::Ping => send_event(&mut write_half, ServerEvent::Pong).await,
        ClientCommand::Shutdown => {
            send_event(&mut write_half, ServerEvent::Ack("shutting down".to_string())).await?;
            shutdown.cancel();
            Ok(())
        }
        ClientCommand::Extract { prompt, url } => {
            let ctx = extractor
                .context()
                .with_cancellation(shutdown.child_token());
            let mut client_gone = false;
            let outcome = {
                let extraction = extractor.extract_with(&ctx, &prompt, &url);
                tokio::pin!(extraction);

                // A client that hangs up cancels its extraction.
                let mut trailing = String::new();
                let finished = tokio::select! {
                    outcome = &mut extraction => Some(outcome),
                    read = reader.read_line(&mut trailing) => {
                        if matches!(read, Ok(0) | Err(_)) {
                            info!(correlation_id = %ctx.correlation_id(), "client disconnected; cancelling");
                            client_gone = true;
                            ctx.cancel();
                        }
                        None
                    }
                };
                match finished {
                    Some(outcome) => outcome,
                    None => extraction.await,
                }
            };
            if client_gone {
                return Ok(());
            }

            let event = match outcome {
                Ok(result) => ServerEvent::Result(result),
                Err(err @ ExtractError::NotFound(_)) => ServerEvent::NotFound {
                    prompt,
                    url,
                    message: err.public_message(),
                },
                Err(err) => ServerEvent::Error {
                    status: err.status(),
                    message: err.public_message(),
                },
            };
            send_event(&mut write_half, event).await
        }
    }
}

async fn send_event(writer: &mut OwnedWriteHalf, event: ServerEvent) -> Result<()> {
    let encoded = serde_json::to_string(&event)?;
    writer.write_all(encoded.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
