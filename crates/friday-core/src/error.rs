use thiserror::Error;

/// Top-level error type for the Friday backend.
///
/// Subsystem crates define their own error enums and implement
/// `From<SubsystemError> for FridayError` so `?` works at the composition root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FridayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Trigger error: {0}")]
    Trigger(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for FridayError {
    fn from(err: toml::de::Error) -> Self {
        FridayError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for FridayError {
    fn from(err: toml::ser::Error) -> Self {
        FridayError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for FridayError {
    fn from(err: serde_json::Error) -> Self {
        FridayError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Friday operations.
pub type Result<T> = std::result::Result<T, FridayError>;
