//! Metadata extraction
//!
//! The second non-streaming call of the pipeline: given a finished
//! story body, produce a title and comprehension questions. Unlike
//! refinement this phase is all-or-nothing, and it always runs against
//! the model that produced the body.

use serde::Deserialize;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::llm::{CompletionClient, CompletionRequest, LlmError, parse_json_object};
use crate::story::prompts;
use storystore::QuestionAnswer;

/// Title and questions extracted for a story body
#[derive(Debug, Clone)]
pub struct StoryMetadata {
    pub title: String,
    pub questions: Vec<QuestionAnswer>,
}

#[derive(Debug, Deserialize)]
struct MetadataPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    questions: Vec<QuestionAnswer>,
}

/// Extract title and questions for a finished story body
///
/// One JSON-mode call against `model` (the body's producing model).
/// Tolerates double-encoded JSON output; rejects a missing or empty
/// title, an empty question list, and any pair missing a field. The
/// requested count is a prompt hint, not a validation rule: a model
/// returning two or four complete pairs still succeeds.
pub async fn extract_metadata(
    client: &dyn CompletionClient,
    generation: &GenerationConfig,
    model: &str,
    story_text: &str,
) -> Result<StoryMetadata, LlmError> {
    let request = CompletionRequest {
        model: model.to_string(),
        messages: prompts::metadata_messages(story_text, generation.question_count),
        json_response: true,
        max_tokens: generation.max_tokens,
        timeout: generation.aux_timeout(),
    };

    let content = client.complete(request).await?;
    let value = parse_json_object(&content)?;

    let payload: MetadataPayload = serde_json::from_value(value)
        .map_err(|e| LlmError::Parse(format!("metadata has wrong shape: {}", e)))?;

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(LlmError::Parse("metadata is missing a title".to_string()));
    }
    if payload.questions.is_empty() {
        return Err(LlmError::Parse("metadata has no questions".to_string()));
    }
    if payload
        .questions
        .iter()
        .any(|q| q.question.trim().is_empty() || q.answer.trim().is_empty())
    {
        return Err(LlmError::Parse("metadata has an incomplete question/answer pair".to_string()));
    }

    debug!(title, questions = payload.questions.len(), "extract_metadata: success");
    Ok(StoryMetadata {
        title,
        questions: payload.questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::{MockCompletionClient, MockResponse};

    const BODY: &str = "Whiskers dreamed of flight.";

    fn valid_json() -> String {
        r#"{"title":"A Cat's Flight","questions":[
            {"question":"Who dreamed?","answer":"Whiskers"},
            {"question":"Of what?","answer":"Flight"},
            {"question":"Did it end?","answer":"Yes"}
        ]}"#
            .to_string()
    }

    #[tokio::test]
    async fn test_extracts_title_and_questions() {
        let client = MockCompletionClient::new(vec![MockResponse::Content(valid_json())]);

        let metadata = extract_metadata(&client, &GenerationConfig::default(), "m1", BODY)
            .await
            .unwrap();

        assert_eq!(metadata.title, "A Cat's Flight");
        assert_eq!(metadata.questions.len(), 3);
        assert_eq!(metadata.questions[0].answer, "Whiskers");
    }

    #[tokio::test]
    async fn test_accepts_double_encoded_payload() {
        let double = serde_json::to_string(&valid_json()).unwrap();
        let client = MockCompletionClient::new(vec![MockResponse::Content(double)]);

        let metadata = extract_metadata(&client, &GenerationConfig::default(), "m1", BODY)
            .await
            .unwrap();

        assert_eq!(metadata.title, "A Cat's Flight");
    }

    #[tokio::test]
    async fn test_rejects_missing_title() {
        let json = r#"{"questions":[{"question":"Q?","answer":"A"}]}"#;
        let client = MockCompletionClient::new(vec![MockResponse::Content(json.to_string())]);

        let result = extract_metadata(&client, &GenerationConfig::default(), "m1", BODY).await;

        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[tokio::test]
    async fn test_rejects_empty_questions() {
        let json = r#"{"title":"T","questions":[]}"#;
        let client = MockCompletionClient::new(vec![MockResponse::Content(json.to_string())]);

        assert!(extract_metadata(&client, &GenerationConfig::default(), "m1", BODY).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_incomplete_pair() {
        let json = r#"{"title":"T","questions":[{"question":"Q?","answer":""}]}"#;
        let client = MockCompletionClient::new(vec![MockResponse::Content(json.to_string())]);

        assert!(extract_metadata(&client, &GenerationConfig::default(), "m1", BODY).await.is_err());
    }

    #[tokio::test]
    async fn test_accepts_off_count_but_complete_pairs() {
        let json = r#"{"title":"T","questions":[
            {"question":"Q1?","answer":"A1"},
            {"question":"Q2?","answer":"A2"}
        ]}"#;
        let client = MockCompletionClient::new(vec![MockResponse::Content(json.to_string())]);

        let metadata = extract_metadata(&client, &GenerationConfig::default(), "m1", BODY)
            .await
            .unwrap();

        assert_eq!(metadata.questions.len(), 2);
    }

    #[tokio::test]
    async fn test_calls_the_producing_model() {
        let client = MockCompletionClient::new(vec![MockResponse::Content(valid_json())]);

        extract_metadata(&client, &GenerationConfig::default(), "catalog-model-2", BODY)
            .await
            .unwrap();

        assert_eq!(client.calls()[0].model, "catalog-model-2");
        assert!(!client.calls()[0].streamed);
    }
}
