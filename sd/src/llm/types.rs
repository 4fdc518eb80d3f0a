//! Completion request types and shared response parsing helpers
//!
//! These types model the OpenAI-format Chat Completions API used by
//! OpenRouter, kept provider-agnostic at the trait boundary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A completion request - everything needed for one call
///
/// Each request is independent; no conversation state is carried between
/// calls. The timeout is per-call because story bodies warrant a longer
/// budget than the shorter refinement and metadata calls.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier (one entry from the catalog)
    pub model: String,

    /// Conversation messages
    pub messages: Vec<ChatMessage>,

    /// Ask the endpoint for a JSON object response
    pub json_response: bool,

    /// Max tokens for the response
    pub max_tokens: u32,

    /// Per-call request timeout
    pub timeout: Duration,
}

/// Parse model output as a JSON object, tolerating double encoding
///
/// Some models return a JSON object serialized as a JSON string (the
/// object encoded twice). If the first parse yields a string, that
/// string is parsed once more. Anything other than an object after at
/// most one unwrap is an error.
pub fn parse_json_object(content: &str) -> Result<serde_json::Value, super::LlmError> {
    let first: serde_json::Value = serde_json::from_str(content.trim())
        .map_err(|e| super::LlmError::Parse(format!("not valid JSON: {}", e)))?;

    let value = match first {
        serde_json::Value::String(inner) => serde_json::from_str(&inner)
            .map_err(|e| super::LlmError::Parse(format!("double-encoded JSON is invalid: {}", e)))?,
        other => other,
    };

    if !value.is_object() {
        return Err(super::LlmError::Parse(format!(
            "expected a JSON object, got: {}",
            value
        )));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        let sys = ChatMessage::system("You are a storyteller");
        assert_eq!(sys.role, Role::System);

        let user = ChatMessage::user("a cat who wants to fly");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "a cat who wants to fly");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_parse_plain_object() {
        let value = parse_json_object(r#"{"title":"A Flight","questions":[]}"#).unwrap();
        assert_eq!(value["title"], "A Flight");
    }

    #[test]
    fn test_parse_double_encoded_matches_plain() {
        let plain = r#"{"title":"A Flight","text":"Whiskers."}"#;
        let double = serde_json::to_string(plain).unwrap();

        let from_plain = parse_json_object(plain).unwrap();
        let from_double = parse_json_object(&double).unwrap();
        assert_eq!(from_plain, from_double);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_json_object("once upon a time").is_err());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_json_object("[1, 2, 3]").is_err());
        // A double-encoded string that unwraps to a bare string is
        // still not an object.
        assert!(parse_json_object(r#""just a sentence""#).is_err());
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        let value = parse_json_object("  {\"story\":\"text\"}\n").unwrap();
        assert_eq!(value["story"], "text");
    }
}
