//! Bearer-token authentication for Agent-facing endpoints. Agents identify
//! themselves via `X-Agent-Id` and authenticate via a standard
//! `Authorization: Bearer <token>` header; both are required for any route
//! marked "(authenticated)" in spec.md §6.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;

use crate::domain::errors::CoreError;
use crate::domain::models::Agent;

use super::error::ApiError;
use super::AppState;

const AGENT_ID_HEADER: &str = "x-agent-id";

/// Extractor that authenticates the caller as a known, token-valid Agent.
pub struct AuthenticatedAgent(pub Agent);

impl FromRequestParts<AppState> for AuthenticatedAgent {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let agent_id = parts
            .headers
            .get(AGENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CoreError::Unauthorized("missing X-Agent-Id header".to_string()))?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| CoreError::Unauthorized("missing bearer token".to_string()))?;

        let agent = state.agents.authenticate(agent_id, token).await?;
        Ok(Self(agent))
    }
}
