//! Story record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One comprehension question with its expected answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

impl QuestionAnswer {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A finished story ready to be persisted
///
/// Only assembled once both the story body and its metadata succeeded;
/// a body without a title and questions never reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStory {
    pub title: String,
    pub text: String,
    pub questions: Vec<QuestionAnswer>,
    /// Identifier of the model that produced the story body
    pub llm_model: String,
}

/// A persisted story with its store-assigned id and timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: String,
    pub title: String,
    pub text: String,
    pub questions: Vec<QuestionAnswer>,
    pub llm_model: String,
    pub created_at: DateTime<Utc>,
}
