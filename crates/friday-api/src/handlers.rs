//! Route handler functions for all API endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use friday_action::{Trigger, TriggerFilter, TriggerKind, TriggerSpec, TriggerStatus};
use friday_chat::ChatResponse;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub pending_triggers: usize,
}

/// Request body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Query parameters for GET /triggers.
#[derive(Debug, Deserialize)]
pub struct TriggerListParams {
    /// "pending", "sent" or "cancelled".
    pub status: Option<String>,
    /// "reminder" or "alert".
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerListResponse {
    pub triggers: Vec<Trigger>,
    pub count: usize,
}

/// Request body for PUT /triggers/{id}/time.
#[derive(Debug, Deserialize)]
pub struct TimeUpdateRequest {
    pub time_spec: String,
}

fn parse_trigger_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid trigger id: '{}'", raw)))
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness plus a count of pending triggers.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pending = state
        .triggers
        .list(TriggerFilter {
            status: Some(TriggerStatus::Pending),
            kind: None,
        })
        .await
        .len();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        pending_triggers: pending,
    })
}

/// POST /chat - run one message through the orchestrator.
///
/// Pipeline failures come back as an ordinary answer, so this endpoint only
/// errors on a malformed request body.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let response = state
        .orchestrator
        .handle(body.session_id.as_deref(), &body.message)
        .await;
    Json(response)
}

/// GET /triggers - list triggers, soonest first.
pub async fn list_triggers(
    State(state): State<AppState>,
    Query(params): Query<TriggerListParams>,
) -> Result<Json<TriggerListResponse>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<TriggerStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<TriggerKind>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let triggers = state.triggers.list(TriggerFilter { status, kind }).await;
    Ok(Json(TriggerListResponse {
        count: triggers.len(),
        triggers,
    }))
}

/// DELETE /triggers/{id} - cancel a pending trigger.
pub async fn cancel_trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Trigger>, ApiError> {
    let id = parse_trigger_id(&id)?;
    let trigger = state.triggers.cancel(id, Utc::now()).await?;
    tracing::info!(trigger_id = %trigger.id, "Trigger cancelled via API");
    Ok(Json(trigger))
}

/// PUT /triggers/{id}/time - reschedule a pending trigger.
pub async fn update_trigger_time(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TimeUpdateRequest>,
) -> Result<Json<Trigger>, ApiError> {
    let id = parse_trigger_id(&id)?;
    let spec = TriggerSpec::parse(&body.time_spec)?;
    let trigger = state.triggers.update_time(id, &spec, Utc::now()).await?;
    tracing::info!(
        trigger_id = %trigger.id,
        remind_at = %trigger.remind_at,
        "Trigger rescheduled via API"
    );
    Ok(Json(trigger))
}
