//! CompletionClient trait definition

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CompletionRequest, LlmError};

/// Stateless chat-completion client - each call is independent
///
/// This is the seam between the story orchestrator and the upstream
/// endpoint: the orchestrator drives a prioritized catalog of models
/// through this one interface, so fakes can stand in for the network
/// during tests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a single completion request and return the message content
    ///
    /// Fails with [`LlmError::Network`] on connection problems or
    /// timeout, [`LlmError::Api`] on a non-2xx status, and
    /// [`LlmError::Parse`] when the response carries no content.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    /// Streaming completion
    ///
    /// Forwards each non-empty token to `token_tx` in upstream order as
    /// it arrives and returns the full accumulated text once the stream
    /// terminates. The client keeps no history: on a mid-stream failure
    /// whatever was already sent stays with the caller.
    async fn stream(
        &self,
        request: CompletionRequest,
        token_tx: mpsc::Sender<String>,
    ) -> Result<String, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One scripted reply for the mock client
    #[derive(Debug, Clone)]
    pub enum MockResponse {
        /// Succeed with this content (streamed as a single token)
        Content(String),
        /// Succeed, streaming these tokens in order
        Tokens(Vec<String>),
        /// Fail with an API error of this status
        Fail(u16, String),
        /// Stream these tokens, then fail mid-stream
        FailAfterTokens(Vec<String>),
    }

    /// A recorded call for assertions
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct MockCall {
        pub model: String,
        pub streamed: bool,
    }

    /// Mock completion client scripted with a queue of replies
    pub struct MockCompletionClient {
        responses: Mutex<VecDeque<MockResponse>>,
        calls: Mutex<Vec<MockCall>>,
    }

    impl MockCompletionClient {
        pub fn new(responses: Vec<MockResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// All calls made so far, in order
        pub fn calls(&self) -> Vec<MockCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn next_response(&self, request: &CompletionRequest, streamed: bool) -> Result<MockResponse, LlmError> {
            self.calls.lock().unwrap().push(MockCall {
                model: request.model.clone(),
                streamed,
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Parse("no more mock responses".to_string()))
        }
    }

    #[async_trait]
    impl CompletionClient for MockCompletionClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            match self.next_response(&request, false)? {
                MockResponse::Content(text) => Ok(text),
                MockResponse::Tokens(tokens) => Ok(tokens.concat()),
                MockResponse::Fail(status, message) => Err(LlmError::Api { status, message }),
                MockResponse::FailAfterTokens(_) => Err(LlmError::Parse("stream cut short".to_string())),
            }
        }

        async fn stream(
            &self,
            request: CompletionRequest,
            token_tx: mpsc::Sender<String>,
        ) -> Result<String, LlmError> {
            match self.next_response(&request, true)? {
                MockResponse::Content(text) => {
                    let _ = token_tx.send(text.clone()).await;
                    Ok(text)
                }
                MockResponse::Tokens(tokens) => {
                    for token in &tokens {
                        let _ = token_tx.send(token.clone()).await;
                    }
                    Ok(tokens.concat())
                }
                MockResponse::Fail(status, message) => Err(LlmError::Api { status, message }),
                MockResponse::FailAfterTokens(tokens) => {
                    for token in &tokens {
                        let _ = token_tx.send(token.clone()).await;
                    }
                    Err(LlmError::Parse("stream cut short".to_string()))
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::llm::ChatMessage;
        use std::time::Duration;

        fn request(model: &str) -> CompletionRequest {
            CompletionRequest {
                model: model.to_string(),
                messages: vec![ChatMessage::user("test")],
                json_response: false,
                max_tokens: 1000,
                timeout: Duration::from_secs(5),
            }
        }

        #[tokio::test]
        async fn test_mock_replays_in_order() {
            let client = MockCompletionClient::new(vec![
                MockResponse::Content("first".to_string()),
                MockResponse::Fail(503, "down".to_string()),
            ]);

            assert_eq!(client.complete(request("m1")).await.unwrap(), "first");
            assert!(client.complete(request("m1")).await.is_err());
            assert_eq!(client.call_count(), 2);
        }

        #[tokio::test]
        async fn test_mock_records_model_and_mode() {
            let client = MockCompletionClient::new(vec![MockResponse::Tokens(vec!["a".to_string()])]);

            let (tx, mut rx) = mpsc::channel(8);
            client.stream(request("m2"), tx).await.unwrap();

            assert_eq!(rx.recv().await.as_deref(), Some("a"));
            assert_eq!(
                client.calls(),
                vec![MockCall {
                    model: "m2".to_string(),
                    streamed: true
                }]
            );
        }

        #[tokio::test]
        async fn test_mock_errors_when_exhausted() {
            let client = MockCompletionClient::new(vec![]);
            assert!(client.complete(request("m1")).await.is_err());
        }
    }
}
