//! Completion client module for StoryDaemon
//!
//! Wraps a single request/response call to a remote chat-completion
//! endpoint, in both streaming and non-streaming modes. The client owns
//! auth-header construction and per-call timeout policy and nothing
//! else: it never buffers stream history and never touches shared state.

pub mod client;
mod error;
mod openrouter;
mod types;

pub use client::CompletionClient;
pub use error::LlmError;
pub use openrouter::OpenRouterClient;
pub use types::{ChatMessage, CompletionRequest, Role, parse_json_object};
