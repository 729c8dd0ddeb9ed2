use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::warn;

use crate::{ClientCommand, ServerEvent};

#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub async fn connect_with_backoff(&self, max_attempts: usize) -> Result<()> {
        let mut delay = Duration::from_millis(100);
        for attempt in 0..max_attempts.max(1) {
            match UnixStream::connect(&self.socket_path).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    if attempt + 1 == max_attempts.max(1) {
                        return Err(err.into());
                    }
                    warn!(attempt, ?err, "daemon connect failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(2));
                }
            }
        }
        Ok(())
    }

    /// Run one extraction on the daemon.  Failures the daemon reports come
    /// back as [`ServerEvent::Error`] or [`ServerEvent::NotFound`], not as
    /// `Err`.
    pub async fn extract(&self, prompt: impl Into<String>, url: impl Into<String>) -> Result<ServerEvent> {
        self.request(ClientCommand::Extract {
            prompt: prompt.into(),
            url: url.into(),
        })
        .await
    }

    pub async fn ping(&self) -> Result<()> {
        match self.request(ClientCommand::Ping).await? {
            ServerEvent::Pong => Ok(()),
            other => bail!("unexpected reply to ping: {other:?}"),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        match self.request(ClientCommand::Shutdown).await? {
            ServerEvent::Ack(_) => Ok(()),
            other => bail!("unexpected reply to shutdown: {other:?}"),
        }
    }

    async fn request(&self, command: ClientCommand) -> Result<ServerEvent> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();

        let request = serde_json::to_string(&command)?;
        write_half.write_all(request.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;

        // The write half stays open until the reply arrives: the daemon
        // treats a closed connection as a cancelled request.
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            bail!("daemon closed the connection without replying; check daemon logs");
        }
        drop(write_half);
        Ok(serde_json::from_str(line.trim())?)
    }
}
