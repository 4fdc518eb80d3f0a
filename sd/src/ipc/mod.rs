//! Inter-Process Communication between the CLI and the daemon
//!
//! JSON-over-newline on a Unix Domain Socket. The CLI connects, sends
//! one request, and reads events until a terminal one arrives; for
//! streaming generation the last exchange is a client acknowledgment.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::StoryClient;
pub use messages::{ClientRequest, ServerEvent};

/// Get the socket path for daemon IPC
///
/// Uses the same base directory as the other daemon files (PID file,
/// log file).
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("storydaemon")
        .join("daemon.sock")
}
