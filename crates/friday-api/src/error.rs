//! API error types and JSON error response formatting.
//!
//! Every failing endpoint answers with the same body shape,
//! `{"error": "<code>", "message": "...", "details": ...}`, and the matching
//! HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use friday_action::TriggerError;
use serde::{Deserialize, Serialize};

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// The resource exists but is not in a state that allows the request.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(msg) = &self {
            tracing::error!(error = %msg, "Request failed");
        }
        let status = self.status();
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        match &err {
            TriggerError::NotFound(_) => ApiError::NotFound(err.to_string()),
            TriggerError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            TriggerError::InvalidSpec(msg) | TriggerError::Validation(msg) => {
                ApiError::BadRequest(msg.clone())
            }
            TriggerError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use friday_action::TriggerStatus;
    use uuid::Uuid;

    #[test]
    fn test_trigger_error_mapping() {
        let cases = vec![
            (TriggerError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                TriggerError::InvalidTransition {
                    from: TriggerStatus::Sent,
                    to: TriggerStatus::Cancelled,
                },
                StatusCode::CONFLICT,
            ),
            (
                TriggerError::InvalidSpec("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                TriggerError::Validation("empty".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                TriggerError::Storage("disk full".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_spec_message_is_passed_through() {
        let err = ApiError::from(TriggerError::InvalidSpec(
            "Couldn't parse time 'soonish'".to_string(),
        ));
        assert_eq!(err.to_string(), "Couldn't parse time 'soonish'");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let resp = ApiError::Conflict("already sent".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "conflict");
        assert_eq!(body.message, "already sent");
        assert!(body.details.is_none());
    }
}
