//! Task Generator.
//!
//! Given a stage and its resolved targets, chunks targets and emits
//! `AgentTask` records. Persistence is the caller's responsibility, so
//! generation, persistence, and policy enforcement can share one
//! transaction.

use uuid::Uuid;

use crate::domain::models::{AgentTask, ScanStage, Target, TaskCategory, TaskStatus};

const DEFAULT_TIMEOUT_SECONDS: u64 = 1800;
const DEFAULT_MAX_RETRIES: u32 = 3;

pub struct TaskGenerator;

impl TaskGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Chunk `targets` into groups of at most `stage.chunk_size` and emit
    /// one pending [`AgentTask`] per chunk, preserving target order.
    pub fn generate(
        &self,
        project_id: Uuid,
        stage: &ScanStage,
        targets: &[Target],
    ) -> Vec<AgentTask> {
        let chunk_size = stage.chunk_size.max(1);
        let now = chrono::Utc::now();
        let policy_snapshot = stage.target_policy.to_json();

        targets
            .chunks(chunk_size)
            .map(|chunk| {
                let input_target = chunk.iter().map(|t| t.value.as_str()).collect::<Vec<_>>().join(",");
                AgentTask {
                    id: Uuid::new_v4(),
                    project_id,
                    workflow_id: stage.workflow_id,
                    stage_id: stage.id,
                    category: TaskCategory::from_tool_name(&stage.tool_name),
                    tool_name: stage.tool_name.clone(),
                    tool_params: stage.param_template.clone(),
                    input_target,
                    status: TaskStatus::Pending,
                    retry_count: 0,
                    max_retries: DEFAULT_MAX_RETRIES,
                    timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
                    assigned_agent_id: None,
                    policy_snapshot: policy_snapshot.clone(),
                    result: None,
                    error_message: None,
                    created_at: now,
                    assigned_at: None,
                    started_at: None,
                    ended_at: None,
                }
            })
            .collect()
    }
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}
