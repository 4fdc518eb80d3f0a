//! Story generation orchestrator
//!
//! Drives the full pipeline for one request: refine the topic, produce
//! a story body by walking the model catalog in priority order, extract
//! title and questions with a second call against the producing model,
//! then persist. A story is persisted only when every phase before it
//! succeeded; there are no partial records.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{GenerationConfig, LlmConfig};
use crate::llm::{CompletionClient, CompletionRequest, LlmError, parse_json_object};
use crate::story::metadata::extract_metadata;
use crate::story::prompts;
use crate::story::refiner::refine_topic;
use storystore::{NewStory, StoreError, StoryRecord, StoryStore};

/// Progress events emitted during a streaming generation session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// One body token, in upstream order
    Token(String),
    /// The body is complete; metadata extraction comes next
    StoryDone,
}

/// Terminal generation failures
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Every catalog model failed to produce a body
    #[error("All models failed to generate a story. Last error: {last}")]
    AllModelsExhausted { last: LlmError },

    /// The body succeeded but metadata extraction did not. No fallback:
    /// a story without title and questions is not persisted.
    #[error("Metadata generation failed: {0}")]
    Metadata(LlmError),

    /// The finished story could not be written to the store
    #[error("Failed to persist story: {0}")]
    Persistence(#[from] StoreError),

    /// The client went away mid-session; generation was abandoned and
    /// nothing was persisted
    #[error("Client closed the session before completion")]
    SessionClosed,
}

/// Orchestrates one story generation at a time
pub struct StoryGenerator {
    client: Arc<dyn CompletionClient>,
    llm: LlmConfig,
    generation: GenerationConfig,
}

impl StoryGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, llm: LlmConfig, generation: GenerationConfig) -> Self {
        Self { client, llm, generation }
    }

    /// Request/response generation: no token streaming, per-model retry
    ///
    /// Each catalog model gets up to `max-attempts` tries with a fixed
    /// delay between them; a non-retryable error forfeits the model's
    /// remaining attempts. The first model to produce a body wins and
    /// later models are never contacted.
    pub async fn generate(&self, raw_topic: &str, store: &StoryStore) -> Result<StoryRecord, GenerationError> {
        let topic = refine_topic(self.client.as_ref(), &self.llm, &self.generation, raw_topic).await;

        let (text, model) = self.generate_body(&topic).await?;
        info!(%model, "story body generated");

        self.finish(store, text, model).await
    }

    /// Streaming generation: forward body tokens as they arrive
    ///
    /// One attempt per catalog model. A mid-stream failure discards that
    /// model's partial text and advances to the next model; tokens
    /// already forwarded stay forwarded. If `events_tx` closes at any
    /// point the session is abandoned with nothing persisted.
    pub async fn generate_streaming(
        &self,
        raw_topic: &str,
        store: &StoryStore,
        events_tx: mpsc::Sender<GenerationEvent>,
    ) -> Result<StoryRecord, GenerationError> {
        let topic = refine_topic(self.client.as_ref(), &self.llm, &self.generation, raw_topic).await;

        let (text, model) = self.stream_body(&topic, &events_tx).await?;
        info!(%model, "story body streamed");

        if events_tx.send(GenerationEvent::StoryDone).await.is_err() {
            return Err(GenerationError::SessionClosed);
        }

        self.finish(store, text, model).await
    }

    /// Metadata extraction and persistence, shared by both modes
    async fn finish(&self, store: &StoryStore, text: String, model: String) -> Result<StoryRecord, GenerationError> {
        let metadata = extract_metadata(self.client.as_ref(), &self.generation, &model, &text)
            .await
            .map_err(GenerationError::Metadata)?;

        let record = store.create(NewStory {
            title: metadata.title,
            text,
            questions: metadata.questions,
            llm_model: model,
        })?;

        info!(id = %record.id, title = %record.title, "story persisted");
        Ok(record)
    }

    /// Walk the catalog with the non-streaming body call
    ///
    /// Returns the body text and the id of the model that produced it.
    async fn generate_body(&self, topic: &str) -> Result<(String, String), GenerationError> {
        let mut last_error = None;

        for model in &self.llm.models {
            for attempt in 1..=self.generation.max_attempts {
                if attempt > 1 {
                    tokio::time::sleep(self.generation.retry_delay()).await;
                }

                let request = CompletionRequest {
                    model: model.clone(),
                    messages: prompts::story_body_json_messages(topic),
                    json_response: true,
                    max_tokens: self.generation.max_tokens,
                    timeout: self.generation.body_timeout(),
                };

                let result = match self.client.complete(request).await {
                    Ok(content) => parse_story_body(&content),
                    Err(e) => Err(e),
                };

                match result {
                    Ok(text) => return Ok((text, model.clone())),
                    Err(e) => {
                        warn!(%model, attempt, "body attempt failed: {}", e);
                        let retryable = e.is_retryable();
                        last_error = Some(e);
                        if !retryable {
                            break;
                        }
                    }
                }
            }
        }

        // The catalog is non-empty by config validation, so at least one
        // attempt ran and last_error is set.
        Err(GenerationError::AllModelsExhausted {
            last: last_error.unwrap_or(LlmError::Parse("empty model catalog".to_string())),
        })
    }

    /// Walk the catalog with the streaming body call, one attempt each
    async fn stream_body(
        &self,
        topic: &str,
        events_tx: &mpsc::Sender<GenerationEvent>,
    ) -> Result<(String, String), GenerationError> {
        let mut last_error = None;

        for model in &self.llm.models {
            let request = CompletionRequest {
                model: model.clone(),
                messages: prompts::story_body_messages(topic),
                json_response: false,
                max_tokens: self.generation.max_tokens,
                timeout: self.generation.body_timeout(),
            };

            let (token_tx, mut token_rx) = mpsc::channel::<String>(64);
            let client = Arc::clone(&self.client);
            let task = tokio::spawn(async move { client.stream(request, token_tx).await });

            // Forward tokens until the stream task drops its sender. If
            // the session side is gone, abort the upstream call too.
            while let Some(token) = token_rx.recv().await {
                if events_tx.send(GenerationEvent::Token(token)).await.is_err() {
                    task.abort();
                    return Err(GenerationError::SessionClosed);
                }
            }

            match task.await {
                Ok(Ok(text)) => return Ok((text, model.clone())),
                Ok(Err(e)) => {
                    warn!(%model, "stream failed: {}", e);
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(%model, "stream task panicked: {}", e);
                    last_error = Some(LlmError::Parse(format!("stream task failed: {}", e)));
                }
            }
        }

        Err(GenerationError::AllModelsExhausted {
            last: last_error.unwrap_or(LlmError::Parse("empty model catalog".to_string())),
        })
    }
}

/// Extract the story text from the non-streaming body reply
///
/// The body call asks for `{"story": "..."}` so that a malformed reply
/// is detectable and counts as a failed attempt rather than persisting
/// garbage.
fn parse_story_body(content: &str) -> Result<String, LlmError> {
    let value = parse_json_object(content)?;
    match value.get("story").and_then(|s| s.as_str()) {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(LlmError::Parse("body reply has no \"story\" text".to_string())),
    }
}
