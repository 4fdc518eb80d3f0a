//! IPC listener for the daemon side
//!
//! Helpers for creating and managing the Unix Domain Socket listener
//! and for framed request/event exchange on an accepted connection.

use std::path::PathBuf;

use eyre::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use tracing::{debug, warn};

use super::messages::{ClientRequest, ServerEvent};

/// Maximum request size. Requests carry at most a topic string.
const MAX_REQUEST_SIZE: usize = 4096;

/// Create and bind a Unix Domain Socket listener for the daemon
///
/// Handles cleanup of stale socket files from previous runs.
pub fn create_listener() -> Result<(tokio::net::UnixListener, PathBuf)> {
    let socket_path = super::get_socket_path();
    create_listener_at(&socket_path)
}

/// Create a listener at a specific path (for testing)
pub fn create_listener_at(socket_path: &PathBuf) -> Result<(tokio::net::UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener: creating IPC socket");

    // Ensure parent directory exists
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    // Clean up stale socket if exists
    if socket_path.exists() {
        debug!(?socket_path, "create_listener: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    // Bind the socket
    let listener = tokio::net::UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener: socket bound successfully");

    Ok((listener, socket_path.clone()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &PathBuf) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Read one request line from the connection
///
/// The read is bounded at the source: at most `MAX_REQUEST_SIZE + 1`
/// bytes are pulled from the socket, so an oversized or endless line
/// is rejected without buffering it.
pub async fn read_request<R>(reader: &mut R) -> Result<ClientRequest>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();

    let bytes_read = (&mut *reader)
        .take(MAX_REQUEST_SIZE as u64 + 1)
        .read_line(&mut line)
        .await
        .context("Failed to read IPC request")?;

    if bytes_read > MAX_REQUEST_SIZE {
        return Err(eyre::eyre!("Request too large: exceeds {} bytes", MAX_REQUEST_SIZE));
    }

    if line.is_empty() {
        return Err(eyre::eyre!("Empty request received"));
    }

    let request: ClientRequest = serde_json::from_str(line.trim()).context("Failed to parse IPC request")?;
    debug!(?request, "read_request: parsed request");

    Ok(request)
}

/// Send one event on the connection
pub async fn send_event<W>(writer: &mut W, event: &ServerEvent) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let event_json = serde_json::to_string(event).context("Failed to serialize event")?;
    writer
        .write_all(event_json.as_bytes())
        .await
        .context("Failed to write event")?;
    writer.write_all(b"\n").await.context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush event")?;
    Ok(())
}
