//! OpenRouter chat-completions client
//!
//! Implements the CompletionClient trait against OpenRouter's
//! OpenAI-format Chat Completions API, with support for both blocking
//! and streaming responses. Retry and model fallback live in the story
//! orchestrator; each call here is a single shot.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CompletionClient, CompletionRequest, LlmError};

/// OpenRouter API client
pub struct OpenRouterClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenRouterClient {
    /// Create a new client
    ///
    /// Timeouts are per-request (set on each [`CompletionRequest`]), so
    /// the underlying HTTP client carries none of its own.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, LlmError> {
        let http = Client::builder().build().map_err(LlmError::Network)?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
        });

        if request.json_response {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    async fn send(&self, body: &serde_json::Value, request: &CompletionRequest) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .json(body)
            .send()
            .await
            .map_err(LlmError::Network)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status, "send: API error");
            return Err(LlmError::Api { status, message });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        debug!(model = %request.model, json = request.json_response, "complete: called");
        let body = self.build_request_body(&request);

        let response = self.send(&body, &request).await?;
        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("malformed response body: {}", e)))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::Parse("response contained no content".to_string()));
        }

        debug!(content_len = content.len(), "complete: success");
        Ok(content)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        token_tx: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        debug!(model = %request.model, "stream: called");
        let mut body = self.build_request_body(&request);
        body["stream"] = serde_json::json!(true);

        let response = self.send(&body, &request).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_content = String::new();
        let mut done = false;

        'outer: while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(LlmError::Network)?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete SSE lines
            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer = buffer[line_end + 1..].to_string();

                match parse_stream_line(&line) {
                    StreamLine::Done => {
                        done = true;
                        break 'outer;
                    }
                    StreamLine::Token(token) => {
                        full_content.push_str(&token);
                        let _ = token_tx.send(token).await;
                    }
                    StreamLine::Skip => {}
                }
            }
        }

        if !done {
            warn!(model = %request.model, "stream: ended without [DONE] sentinel");
        }

        if full_content.is_empty() {
            return Err(LlmError::Parse("stream produced no content".to_string()));
        }

        debug!(content_len = full_content.len(), "stream: complete");
        Ok(full_content)
    }
}

/// Outcome of parsing one line of the SSE framing
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    /// A content token to forward
    Token(String),
    /// The end-of-stream sentinel
    Done,
    /// Empty, malformed, or non-content line - skipped, never fatal
    Skip,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.strip_prefix("data: ") else {
        return StreamLine::Skip;
    };

    if data == "[DONE]" {
        return StreamLine::Done;
    }

    let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else {
        return StreamLine::Skip;
    };

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
    {
        Some(token) if !token.is_empty() => StreamLine::Token(token),
        _ => StreamLine::Skip,
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// Streaming types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
