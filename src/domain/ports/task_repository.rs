//! Task repository port.
//!
//! `claim_pending` is the one method with a non-obvious contract: it must
//! move `Pending` rows to `Assigned` and return them atomically, so that two
//! concurrent dispatch loops racing the same row never both receive it.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{AgentTask, TaskCategory, TaskStatus};

/// Filter criteria for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub workflow_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub assigned_agent_id: Option<String>,
}

/// The matching predicate `claim_pending` applies within a category:
/// capability and tag subset requirements for `agent`-category tasks.
/// `any()` claims without restriction, the shape the Local Agent uses for
/// `system`-category tasks.
#[derive(Debug, Clone, Default)]
pub struct ClaimPredicate {
    pub capabilities: Option<HashSet<String>>,
    pub required_tags: Option<HashSet<String>>,
}

impl ClaimPredicate {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matching(capabilities: HashSet<String>, required_tags: HashSet<String>) -> Self {
        Self { capabilities: Some(capabilities), required_tags: Some(required_tags) }
    }
}

/// Repository interface for AgentTask persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &AgentTask) -> CoreResult<()>;

    async fn create_batch(&self, tasks: &[AgentTask]) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<AgentTask>>;

    async fn list(&self, filter: TaskFilter) -> CoreResult<Vec<AgentTask>>;

    /// Tasks in `Pending` state for a stage, the pool the Task Dispatcher
    /// draws from.
    async fn list_pending_for_stage(&self, stage_id: Uuid) -> CoreResult<Vec<AgentTask>>;

    /// All tasks of a stage, used to decide whether the stage has finished
    /// (all terminal) before materializing its successors.
    async fn list_for_stage(&self, stage_id: Uuid) -> CoreResult<Vec<AgentTask>>;

    /// Tasks currently `Assigned` or `Running` that have exceeded their
    /// `timeout_seconds`, the set the timeout sweep re-queues.
    async fn list_overdue(&self, now: chrono::DateTime<chrono::Utc>) -> CoreResult<Vec<AgentTask>>;

    /// Atomically claim up to `limit` pending tasks in `category` matching
    /// `predicate` for `agent_id`, moving them `Pending -> Assigned`. Rows
    /// already claimed by a concurrent caller are skipped, never
    /// double-returned.
    async fn claim_pending(
        &self,
        category: TaskCategory,
        predicate: &ClaimPredicate,
        agent_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<AgentTask>>;

    /// Transition a task's status, validating against
    /// [`crate::domain::models::agent_task::TaskStatus::can_transition_to`].
    async fn update_status(&self, id: Uuid, next: TaskStatus) -> CoreResult<()>;

    /// Record a submitted result and move the task to its terminal state.
    async fn record_result(
        &self,
        id: Uuid,
        next: TaskStatus,
        result: Option<String>,
        error_message: Option<String>,
    ) -> CoreResult<()>;

    /// Re-queue a task for another attempt: increments `retry_count`, clears
    /// assignment, and returns it to `Pending`. No-op error if the retry
    /// budget (`max_retries`) is exhausted.
    async fn retry_task(&self, id: Uuid) -> CoreResult<()>;

    /// Return an `Assigned` task to `Pending` without touching
    /// `retry_count`. For back-pressure releases (rate limit exhaustion)
    /// where the task was never actually attempted, as opposed to
    /// `retry_task`'s semantic-failure bookkeeping.
    async fn release_claim(&self, id: Uuid) -> CoreResult<()>;

    async fn cancel_for_project(&self, project_id: Uuid) -> CoreResult<u64>;
}
