//! Error types for the chat pipeline.

use friday_core::error::FridayError;

/// Errors from the chat engine's own bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {max} characters ({len} given)")]
    MessageTooLong { len: usize, max: usize },
    #[error("intent parse error: {0}")]
    IntentParse(String),
    #[error("conversation store error: {0}")]
    Conversation(String),
}

/// Errors from the text-completion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Http(String),
    #[error("completion timed out after {0} seconds")]
    Timeout(u64),
    #[error("completion returned no text")]
    EmptyResponse,
    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

/// Errors a handler reports instead of an answer.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Missing or unusable input; the message is shown to the user as is.
    #[error("{0}")]
    Validation(String),
    #[error("Failed to {operation}: {reason}")]
    Failed { operation: String, reason: String },
}

impl HandlerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HandlerError::Validation(msg.into())
    }

    pub fn failed(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        HandlerError::Failed {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Text shown to the user in place of an answer.
    pub fn user_message(&self) -> String {
        format!("❌ {}", self)
    }
}

/// Failure reported by an external collaborator (calendar, search, notes...).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl From<ChatError> for FridayError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Conversation(msg) => FridayError::Storage(msg),
            other => FridayError::Chat(other.to_string()),
        }
    }
}

impl From<CompletionError> for FridayError {
    fn from(err: CompletionError) -> Self {
        FridayError::ExternalService(err.to_string())
    }
}
