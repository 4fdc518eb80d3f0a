//! Topic refinement
//!
//! One non-streaming call that turns raw client input into a clean
//! one-sentence topic. Refinement is best-effort: any failure falls
//! back to the raw topic unchanged and generation proceeds.

use tracing::{debug, warn};

use crate::config::{GenerationConfig, LlmConfig};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::story::prompts;

/// Refine a raw topic into a single clean sentence
///
/// Uses the highest-priority catalog model. Never fails: transport
/// errors, upstream errors, and empty output all resolve to the raw
/// topic, so a refinement outage degrades story quality rather than
/// availability.
pub async fn refine_topic(
    client: &dyn CompletionClient,
    llm: &LlmConfig,
    generation: &GenerationConfig,
    raw_topic: &str,
) -> String {
    let Some(model) = llm.models.first() else {
        return raw_topic.to_string();
    };

    let request = CompletionRequest {
        model: model.clone(),
        messages: prompts::refine_topic_messages(raw_topic),
        json_response: false,
        max_tokens: generation.max_tokens,
        timeout: generation.aux_timeout(),
    };

    match client.complete(request).await {
        Ok(content) => {
            let refined = content.trim();
            if refined.is_empty() {
                warn!("refine_topic: empty refinement, using raw topic");
                raw_topic.to_string()
            } else {
                debug!(refined, "refine_topic: success");
                refined.to_string()
            }
        }
        Err(e) => {
            warn!("refine_topic: failed ({}), using raw topic", e);
            raw_topic.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::{MockCompletionClient, MockResponse};

    fn configs() -> (LlmConfig, GenerationConfig) {
        (LlmConfig::default(), GenerationConfig::default())
    }

    #[tokio::test]
    async fn test_refined_topic_replaces_raw() {
        let client = MockCompletionClient::new(vec![MockResponse::Content(
            "A brief story about a cat who dreams of flying.\n".to_string(),
        )]);
        let (llm, generation) = configs();

        let topic = refine_topic(&client, &llm, &generation, "cat flying PLEASE LONG").await;

        assert_eq!(topic, "A brief story about a cat who dreams of flying.");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_identity() {
        let client = MockCompletionClient::new(vec![MockResponse::Fail(503, "down".to_string())]);
        let (llm, generation) = configs();

        let topic = refine_topic(&client, &llm, &generation, "a cat who wants to fly").await;

        assert_eq!(topic, "a cat who wants to fly");
    }

    #[tokio::test]
    async fn test_empty_refinement_is_identity() {
        let client = MockCompletionClient::new(vec![MockResponse::Content("  \n".to_string())]);
        let (llm, generation) = configs();

        let topic = refine_topic(&client, &llm, &generation, "a lighthouse keeper").await;

        assert_eq!(topic, "a lighthouse keeper");
    }

    #[tokio::test]
    async fn test_uses_highest_priority_model() {
        let client = MockCompletionClient::new(vec![MockResponse::Content("ok".to_string())]);
        let (llm, generation) = configs();

        refine_topic(&client, &llm, &generation, "anything").await;

        assert_eq!(client.calls()[0].model, llm.models[0]);
        assert!(!client.calls()[0].streamed);
    }
}
