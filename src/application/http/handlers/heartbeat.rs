//! `POST /api/v1/agent/heartbeat` (spec.md §6).

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::application::http::error::ApiError;
use crate::application::http::AppState;
use crate::domain::errors::CoreError;

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub agent_id: String,
    pub status: String,
    /// Accepted for forward compatibility; no column stores per-heartbeat
    /// metrics today.
    #[serde(default)]
    pub metrics: Option<Value>,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<HeartbeatRequest>,
) -> Result<(), ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| CoreError::Unauthorized("missing bearer token".to_string()))?;

    state.agents.authenticate(&body.agent_id, token).await?;
    state.agents.heartbeat(&body.agent_id, &body.status).await?;
    Ok(())
}
