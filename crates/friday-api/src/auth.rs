//! API key middleware for protected endpoints.
//!
//! Accepts either `x-api-key: <key>` or `Authorization: Bearer <key>`. When no
//! key is configured every request passes.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// The key presented by the client, if any.
fn presented_key(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    if let Some(value) = headers.get("x-api-key") {
        return value
            .to_str()
            .map(|v| Some(v.trim()))
            .map_err(|_| ApiError::Unauthorized("Invalid x-api-key header encoding".to_string()));
    }
    match headers.get("authorization") {
        Some(value) => {
            let value = value.to_str().map_err(|_| {
                ApiError::Unauthorized("Invalid Authorization header encoding".to_string())
            })?;
            Ok(value.strip_prefix("Bearer ").map(str::trim))
        }
        None => Ok(None),
    }
}

pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let expected = match state.api_key() {
        Some(key) => key,
        None => return next.run(req).await,
    };

    let rejection = match presented_key(req.headers()) {
        Ok(Some(key)) if key == expected => None,
        Ok(Some(_)) => Some(ApiError::Unauthorized("Invalid API key".to_string())),
        Ok(None) => Some(ApiError::Unauthorized("Missing API key".to_string())),
        Err(e) => Some(e),
    };
    match rejection {
        None => next.run(req).await,
        Some(e) => e.into_response(),
    }
}
