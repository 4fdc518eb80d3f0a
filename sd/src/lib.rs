//! StoryDaemon - AI story generation daemon
//!
//! StoryDaemon turns a free-text topic into a short story with
//! comprehension questions. A prioritized catalog of chat-completion
//! models is tried in order (with per-model retries in request/response
//! mode, single attempts with model fallback in streaming mode), tokens
//! are streamed to the client as they arrive, and a second non-streaming
//! call derives a title and quiz questions from the finished text before
//! the combined record is persisted.
//!
//! # Modules
//!
//! - [`llm`] - Completion client trait and OpenRouter implementation
//! - [`story`] - Topic refiner, metadata extractor, and the generation
//!   state machine
//! - [`ipc`] - JSON-over-newline protocol on a Unix domain socket
//! - [`daemon`] - Process management and the session accept loop
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod daemon;
pub mod ipc;
pub mod llm;
pub mod story;

// Re-export commonly used types
pub use config::{Config, GenerationConfig, LlmConfig};
pub use llm::{CompletionClient, CompletionRequest, LlmError, OpenRouterClient};
pub use story::{GenerationError, GenerationEvent, StoryGenerator};
