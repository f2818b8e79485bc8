//! `GET /api/v1/agent/rules/<type>/version` and `.../download` (spec.md §6).
//!
//! Snapshots are built fresh per request (no persisted cache — the rule
//! directory is the source of truth and the build is deterministic, spec
//! property P5), so `version` and `download` simply differ in how much of
//! the built [`RuleSnapshot`] they return.

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::application::http::error::ApiError;
use crate::application::http::AppState;
use crate::domain::models::RuleSnapshot;

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version_hash: String,
}

pub async fn version(
    State(state): State<AppState>,
    Path(rule_type): Path<String>,
) -> Result<Json<VersionResponse>, ApiError> {
    let snapshot = state.rule_snapshots.build(&rule_type)?;
    Ok(Json(VersionResponse { version_hash: snapshot.version_hash }))
}

pub async fn download(
    State(state): State<AppState>,
    Path(rule_type): Path<String>,
) -> Result<Response, ApiError> {
    let snapshot: RuleSnapshot = state.rule_snapshots.build(&rule_type)?;

    let mut response = snapshot.encrypted_body.into_response();
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    response
        .headers_mut()
        .insert("x-content-encryption", HeaderValue::from_static(RuleSnapshot::CONTENT_ENCRYPTION));
    response.headers_mut().insert(
        "x-rule-signature",
        HeaderValue::from_str(&snapshot.signature).map_err(|_| {
            crate::domain::errors::CoreError::RuleSnapshot("signature is not valid header text".to_string())
        })?,
    );
    Ok(response)
}
