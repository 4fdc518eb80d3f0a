//! IPC message types for daemon communication
//!
//! Simple JSON-over-newline protocol. Each message is a single line of
//! JSON followed by `\n`, tagged with a snake_case `type` field.

use serde::{Deserialize, Serialize};
use storystore::StoryRecord;

/// Requests from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Generate a story, replying with one terminal event
    Generate { topic: String },

    /// Generate a story, streaming body tokens as they arrive
    GenerateStream { topic: String },

    /// Client acknowledgment after the terminal event of a streaming
    /// session
    Ack,

    /// Ping to check if daemon is alive
    Ping,

    /// Request daemon to stop gracefully
    Shutdown,
}

/// Events from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// One story body token, in generation order
    Token { payload: String },

    /// The story body is complete; metadata extraction is underway
    StoryDone,

    /// Terminal success: the persisted story
    Complete { payload: StoryRecord },

    /// Terminal failure
    Error { payload: String },

    /// Pong response to ping
    Pong { version: String },

    /// Acknowledgment (shutdown accepted)
    Ok,
}

impl ServerEvent {
    /// A terminal event ends the session (modulo the streaming ack)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerEvent::Complete { .. } | ServerEvent::Error { .. })
    }
}
