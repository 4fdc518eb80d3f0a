//! LLM error types

use thiserror::Error;

/// Errors that can occur during completion calls
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network failure or request timeout
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response from the upstream endpoint
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Model output that could not be interpreted (missing content,
    /// malformed JSON, wrong shape)
    #[error("Invalid response: {0}")]
    Parse(String),
}

impl LlmError {
    /// Check if another attempt against the same model is worthwhile
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_) => true,
            LlmError::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            // Malformed output is per-response, not per-model
            LlmError::Parse(_) => true,
        }
    }
}
