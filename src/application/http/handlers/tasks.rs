//! `GET /api/v1/agent/tasks` and `POST /api/v1/agent/tasks/{id}/result`
//! (spec.md §6).

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::http::auth::AuthenticatedAgent;
use crate::application::http::error::ApiError;
use crate::application::http::AppState;
use crate::domain::errors::CoreError;
use crate::domain::models::{AgentTask, ResultKind, StageResult, TaskStatus};
use crate::domain::ports::TaskFilter;
use crate::services::{DispatchOutcome, GlobalPolicy};

/// Wire shape for a claimed task, per spec.md §6 "Task record (wire form)".
#[derive(Debug, Serialize)]
pub struct TaskWire {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub workflow_id: Uuid,
    pub stage_id: Uuid,
    pub category: &'static str,
    pub tool_name: String,
    pub tool_params: String,
    pub input_target: String,
    pub policy_snapshot: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl From<&AgentTask> for TaskWire {
    fn from(task: &AgentTask) -> Self {
        Self {
            task_id: task.id,
            project_id: task.project_id,
            workflow_id: task.workflow_id,
            stage_id: task.stage_id,
            category: task.category.as_str(),
            tool_name: task.tool_name.clone(),
            tool_params: task.tool_params.clone(),
            input_target: task.input_target.clone(),
            policy_snapshot: task.policy_snapshot.clone(),
            timeout_seconds: task.timeout_seconds,
            max_retries: task.max_retries,
        }
    }
}

/// Fetch up to N claimed tasks for the authenticated Agent. Project scope
/// was already enforced at stage materialization time (spec.md §4.8); the
/// dispatch-time re-check here only re-applies the operator-wide whitelist
/// and skip rule, since a single poll can claim tasks across many projects.
pub async fn fetch_tasks(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
) -> Result<Json<Vec<TaskWire>>, ApiError> {
    let assigned = state
        .tasks
        .list(TaskFilter { assigned_agent_id: Some(agent.id.clone()), ..Default::default() })
        .await?;
    let currently_assigned = assigned.iter().filter(|t| !t.status.is_terminal()).count() as u32;

    let global_policy = GlobalPolicy {
        scope: Vec::new(),
        whitelist: state.policy_defaults.whitelist.clone(),
        skip_rule: state.policy_defaults.skip_rule.clone(),
    };

    let claimed = match state.dispatcher.dispatch(&agent, currently_assigned, &global_policy).await? {
        DispatchOutcome::Tasks(tasks) => tasks,
        DispatchOutcome::Busy => return Ok(Json(Vec::new())),
    };

    let mut delivered = Vec::with_capacity(claimed.len());
    for task in &claimed {
        if let Err(e) = state.tasks.update_status(task.id, TaskStatus::Running).await {
            tracing::error!(task_id = %task.id, error = %e, "failed to mark dispatched task running");
            continue;
        }
        delivered.push(TaskWire::from(task));
    }
    Ok(Json(delivered))
}

#[derive(Debug, Deserialize)]
pub struct ResultRequest {
    pub agent_id: String,
    pub kind: ResultKind,
    pub payload: String,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub async fn submit_result(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Path(task_id): Path<Uuid>,
    Json(body): Json<ResultRequest>,
) -> Result<(), ApiError> {
    if body.agent_id.trim().is_empty() {
        return Err(CoreError::Validation("agent_id is required".to_string()).into());
    }
    if body.agent_id != agent.id {
        return Err(CoreError::Unauthorized(
            "agent_id in body does not match the authenticated agent".to_string(),
        )
        .into());
    }
    let result = StageResult {
        task_id,
        agent_id: agent.id,
        kind: body.kind,
        payload: body.payload,
        evidence_refs: body.evidence_refs,
        error: body.error,
        submitted_at: Utc::now(),
    };
    state.results.ingest(result).await?;
    Ok(())
}
