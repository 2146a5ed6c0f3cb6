//! Error types for the trigger engine.

use friday_core::error::FridayError;
use uuid::Uuid;

use crate::types::{TodoStatus, TriggerStatus};

/// Errors from trigger creation, lifecycle and persistence.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Trigger not found: {0}")]
    NotFound(Uuid),
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: TriggerStatus,
        to: TriggerStatus,
    },
    #[error("Invalid time specification: {0}")]
    InvalidSpec(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors from outbound notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notifier is not configured")]
    NotConfigured,
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Delivery timed out after {0} seconds")]
    Timeout(u64),
    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// Errors from the to-do task store.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(TodoStatus, TodoStatus),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<TriggerError> for FridayError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::Storage(msg) => FridayError::Storage(msg),
            TriggerError::Validation(msg) => FridayError::Validation(msg),
            other => FridayError::Trigger(other.to_string()),
        }
    }
}

impl From<NotifyError> for FridayError {
    fn from(err: NotifyError) -> Self {
        FridayError::ExternalService(err.to_string())
    }
}

impl From<TodoError> for FridayError {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::Storage(msg) => FridayError::Storage(msg),
            other => FridayError::Validation(other.to_string()),
        }
    }
}
