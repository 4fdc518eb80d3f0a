//! IPC client for communicating with the daemon
//!
//! Used by the CLI to drive a generation session over the Unix Domain
//! Socket and for daemon control (ping, shutdown).

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use super::get_socket_path;
use super::messages::{ClientRequest, ServerEvent};
use storystore::StoryRecord;

/// Default timeout for control operations (connect, ping, shutdown)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a whole generation session. Covers refinement, every
/// fallback attempt, and metadata extraction.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Maximum event size. The `complete` event carries a full story.
const MAX_EVENT_SIZE: usize = 1024 * 1024;

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct StoryClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for StoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self {
            socket_path: get_socket_path(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a client with a custom socket path (for testing)
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout for control operations
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Check if daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("StoryClient: pinging daemon");
        let (mut reader, mut writer) = self.connect().await?;
        self.send_request(&mut writer, &ClientRequest::Ping).await?;

        match self.read_event(&mut reader, self.timeout).await? {
            ServerEvent::Pong { version } => Ok(version),
            ServerEvent::Error { payload } => Err(eyre::eyre!("Daemon error: {}", payload)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Request daemon to shutdown gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("StoryClient: requesting daemon shutdown");
        let (mut reader, mut writer) = self.connect().await?;
        self.send_request(&mut writer, &ClientRequest::Shutdown).await?;

        match self.read_event(&mut reader, self.timeout).await? {
            ServerEvent::Ok => Ok(()),
            ServerEvent::Error { payload } => Err(eyre::eyre!("Daemon error: {}", payload)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Generate a story without streaming
    ///
    /// Blocks until the daemon replies with the persisted story or an
    /// error.
    pub async fn generate(&self, topic: &str) -> Result<StoryRecord> {
        debug!(topic, "StoryClient: requesting generation");
        let (mut reader, mut writer) = self.connect().await?;
        let request = ClientRequest::Generate {
            topic: topic.to_string(),
        };
        self.send_request(&mut writer, &request).await?;

        match self.read_event(&mut reader, GENERATION_TIMEOUT).await? {
            ServerEvent::Complete { payload } => Ok(payload),
            ServerEvent::Error { payload } => Err(eyre::eyre!("Generation failed: {}", payload)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Generate a story, invoking `on_token` for each body token
    ///
    /// Consumes token and story_done events until the terminal
    /// complete/error arrives, then acknowledges so the daemon can
    /// close the session.
    pub async fn generate_stream(
        &self,
        topic: &str,
        mut on_token: impl FnMut(&str),
    ) -> Result<StoryRecord> {
        debug!(topic, "StoryClient: requesting streaming generation");
        let (mut reader, mut writer) = self.connect().await?;
        let request = ClientRequest::GenerateStream {
            topic: topic.to_string(),
        };
        self.send_request(&mut writer, &request).await?;

        let outcome = loop {
            match self.read_event(&mut reader, GENERATION_TIMEOUT).await? {
                ServerEvent::Token { payload } => on_token(&payload),
                ServerEvent::StoryDone => debug!("StoryClient: story body complete"),
                ServerEvent::Complete { payload } => break Ok(payload),
                ServerEvent::Error { payload } => break Err(eyre::eyre!("Generation failed: {}", payload)),
                other => break Err(eyre::eyre!("Unexpected event: {:?}", other)),
            }
        };

        // Acknowledge the terminal event so the daemon closes cleanly
        if let Err(e) = self.send_request(&mut writer, &ClientRequest::Ack).await {
            debug!("StoryClient: ack failed: {}", e);
        }

        outcome
    }

    async fn connect(&self) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")?;

        let (read_half, write_half) = stream.into_split();
        Ok((BufReader::new(read_half), write_half))
    }

    async fn send_request(&self, writer: &mut OwnedWriteHalf, request: &ClientRequest) -> Result<()> {
        let request_json = serde_json::to_string(request).context("Failed to serialize request")?;

        tokio::time::timeout(self.timeout, async {
            writer
                .write_all(request_json.as_bytes())
                .await
                .context("Failed to write request")?;
            writer.write_all(b"\n").await.context("Failed to write newline")?;
            writer.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        Ok(())
    }

    async fn read_event(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        timeout: Duration,
    ) -> Result<ServerEvent> {
        let mut line = String::new();

        tokio::time::timeout(timeout, async {
            let bytes_read = reader.read_line(&mut line).await.context("Failed to read event")?;

            if bytes_read == 0 {
                return Err(eyre::eyre!("Daemon closed the connection"));
            }
            if bytes_read > MAX_EVENT_SIZE {
                return Err(eyre::eyre!("Event too large: {} bytes", bytes_read));
            }

            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Read timeout")??;

        let event: ServerEvent = serde_json::from_str(line.trim()).context("Failed to parse daemon event")?;
        Ok(event)
    }
}
