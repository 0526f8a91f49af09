/// Error types for adaptive-chat
///
/// This module defines all possible errors that can occur in the engine.
/// Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Main error type for adaptive-chat operations
#[derive(Error, Debug)]
pub enum AdaptError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O errors (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Context failed validation at the persistence boundary
    #[error("Invalid context data: {0}")]
    InvalidContext(String),

    /// Suggestion failed validation. Carries every problem found.
    #[error("Invalid suggestion: {}", .0.join("; "))]
    InvalidSuggestion(Vec<String>),

    /// No session with the given id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session create/resume/merge failure
    #[error("Session error: {0}")]
    Session(String),

    /// Context inference failed
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Suggestion generation failed
    #[error("Suggestion error: {0}")]
    Generation(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for adaptive-chat operations
pub type Result<T> = std::result::Result<T, AdaptError>;

/// Convert AdaptError to a user-friendly error message
impl AdaptError {
    pub fn user_message(&self) -> String {
        match self {
            AdaptError::Database(e) => {
                format!("Database error occurred. Please try again. Details: {}", e)
            }
            AdaptError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            AdaptError::Serialization(e) => {
                format!("Data format error: {}", e)
            }
            AdaptError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
            AdaptError::InvalidContext(msg) => {
                format!("Conversation context was rejected: {}", msg)
            }
            AdaptError::InvalidSuggestion(errors) => {
                format!("Suggestion was rejected: {}", errors.join(", "))
            }
            AdaptError::SessionNotFound(id) => {
                format!("Session '{}' could not be found", id)
            }
            AdaptError::Session(msg) => {
                format!("Session operation failed, please retry: {}", msg)
            }
            AdaptError::Analysis(msg) => {
                format!("Context analysis failed: {}", msg)
            }
            AdaptError::Generation(msg) => {
                format!("Suggestion generation failed: {}", msg)
            }
            AdaptError::Generic(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = AdaptError::SessionNotFound("abc".to_string());
        assert!(err.user_message().contains("abc"));

        let err = AdaptError::InvalidSuggestion(vec![
            "id must not be empty".to_string(),
            "content must not be empty".to_string(),
        ]);
        assert!(err.user_message().contains("id must not be empty"));
        assert!(err.user_message().contains("content must not be empty"));
    }

    #[test]
    fn test_error_display() {
        let err = AdaptError::InvalidContext("missing id".to_string());
        let display = format!("{}", err);
        assert!(display.starts_with("Invalid context data"));

        let err = AdaptError::InvalidSuggestion(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Invalid suggestion: a; b");
    }
}
