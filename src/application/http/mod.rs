//! Thin Axum HTTP server exposing spec.md §6's Agent-facing wire contract.
//! Handlers are deliberately minimal: extract, call a service, serialize.

pub mod auth;
mod error;
mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::domain::ports::TaskRepository;
use crate::services::{AgentRegistry, GlobalPolicyDefaults, ResultIngestor, RuleSnapshotBuilder, TaskDispatcher};

/// Shared handles every route needs. Cheap to clone: everything behind an
/// `Arc`, exactly the shape axum's `State` extractor wants.
#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<AgentRegistry>,
    pub dispatcher: Arc<TaskDispatcher>,
    pub results: Arc<ResultIngestor>,
    pub tasks: Arc<dyn TaskRepository>,
    pub rule_snapshots: Arc<RuleSnapshotBuilder>,
    pub policy_defaults: Arc<GlobalPolicyDefaults>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/agent/register", post(handlers::register))
        .route("/api/v1/agent/heartbeat", post(handlers::heartbeat))
        .route("/api/v1/agent/tasks", get(handlers::fetch_tasks))
        .route("/api/v1/agent/tasks/{id}/result", post(handlers::submit_result))
        .route("/api/v1/agent/rules/{rule_type}/version", get(handlers::version))
        .route("/api/v1/agent/rules/{rule_type}/download", get(handlers::download))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is terminated. The caller spawns this
/// alongside the scheduler tick loop, the local agent loop, and the
/// heartbeat sweeper (spec.md §5).
pub async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "HTTP server listening");
    axum::serve(listener, router(state)).await.context("HTTP server terminated")
}
