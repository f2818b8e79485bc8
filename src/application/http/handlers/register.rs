//! `POST /api/v1/agent/register` (spec.md §6).

use std::collections::HashSet;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::http::error::ApiError;
use crate::application::http::AppState;
use crate::services::RegistrationRequest;

/// Default concurrent-task ceiling when the caller omits `cpu_cores` or
/// reports an implausible value.
const FALLBACK_MAX_CONCURRENT: u32 = 4;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub hostname: String,
    pub ip_address: String,
    pub port: u16,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub cpu_cores: u32,
    pub memory_total: u64,
    pub disk_total: u64,
    pub capabilities: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub agent_id: String,
    pub grpc_token: String,
    pub token_expiry: DateTime<Utc>,
    pub status: String,
}

/// `version`/`os`/`arch`/`memory_total`/`disk_total` have no column in the
/// Agent domain model (spec.md §3 only lists what's representable); they're
/// accepted on the wire and logged, never persisted.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    tracing::info!(
        hostname = %body.hostname, version = %body.version, os = %body.os, arch = %body.arch,
        "agent registration request"
    );

    let req = RegistrationRequest {
        hostname: body.hostname,
        address: body.ip_address,
        port: body.port,
        capabilities: body.capabilities.into_iter().collect::<HashSet<_>>(),
        tags: body.tags.into_iter().collect::<HashSet<_>>(),
        max_concurrent: if body.cpu_cores == 0 { FALLBACK_MAX_CONCURRENT } else { body.cpu_cores },
    };

    let result = state.agents.register(req).await?;
    Ok(Json(RegisterResponse {
        agent_id: result.agent_id,
        grpc_token: result.bearer_token,
        token_expiry: result.token_expiry,
        status: "registered".to_string(),
    }))
}
