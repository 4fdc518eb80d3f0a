//! Store error types

use thiserror::Error;

/// Errors that can occur while reading or writing the story store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid questions column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp column: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Story not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Check if this is a missing-record error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(StoreError::NotFound("abc".to_string()).is_not_found());
        assert!(!StoreError::Sqlite(rusqlite::Error::InvalidQuery).is_not_found());
    }
}
