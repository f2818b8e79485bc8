//! Result Ingestor.
//!
//! Receives a [`StageResult`] from an authenticated Agent, validates it
//! against the claiming Agent and task state, persists it, and transitions
//! the task to its terminal status. The Scheduler picks up the completion
//! on its next tick.

use std::sync::Arc;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{ResultKind, StageResult, TaskStatus};
use crate::domain::ports::TaskRepository;

pub struct ResultIngestor {
    tasks: Arc<dyn TaskRepository>,
}

impl ResultIngestor {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    /// Ingest a result submitted by `result.agent_id`. Rejects submissions
    /// from an Agent other than the one that claimed the task, and
    /// submissions against a task that is not `running` (already terminal,
    /// or never claimed).
    #[tracing::instrument(skip(self, result))]
    pub async fn ingest(&self, result: StageResult) -> CoreResult<()> {
        let task = self
            .tasks
            .get(result.task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("unknown task {}", result.task_id)))?;

        if task.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "task {} is already in terminal state {:?}",
                task.id, task.status
            )));
        }
        if task.status != TaskStatus::Running {
            return Err(CoreError::Conflict(format!(
                "task {} is not running (currently {:?})",
                task.id, task.status
            )));
        }
        if task.assigned_agent_id.as_deref() != Some(result.agent_id.as_str()) {
            return Err(CoreError::Conflict(format!(
                "task {} was not claimed by agent {}",
                task.id, result.agent_id
            )));
        }

        let (next_status, error_message) = match (&result.kind, &result.error) {
            (_, Some(err)) => (TaskStatus::Failed, Some(err.clone())),
            (ResultKind::SystemOp | ResultKind::PortScan | ResultKind::WebFinger | ResultKind::Vuln, None) => {
                (TaskStatus::Completed, None)
            }
        };

        self.tasks
            .record_result(task.id, next_status, Some(result.payload.clone()), error_message)
            .await?;

        tracing::info!(task_id = %task.id, agent_id = %result.agent_id, "ingested stage result");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteTaskRepository};
    use crate::domain::models::{AgentTask, TaskCategory};
    use uuid::Uuid;

    fn running_task(assigned_agent_id: &str) -> AgentTask {
        let now = chrono::Utc::now();
        AgentTask {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            stage_id: Uuid::new_v4(),
            category: TaskCategory::Agent,
            tool_name: "nmap_portscan".to_string(),
            tool_params: "{}".to_string(),
            input_target: "10.0.0.1".to_string(),
            status: TaskStatus::Running,
            retry_count: 0,
            max_retries: 3,
            timeout_seconds: 1800,
            assigned_agent_id: Some(assigned_agent_id.to_string()),
            policy_snapshot: "{}".to_string(),
            result: None,
            error_message: None,
            created_at: now,
            assigned_at: Some(now),
            started_at: Some(now),
            ended_at: None,
        }
    }

    fn result(task_id: Uuid, agent_id: &str, error: Option<&str>) -> StageResult {
        StageResult {
            task_id,
            agent_id: agent_id.to_string(),
            kind: ResultKind::PortScan,
            payload: "{\"open_ports\":[22,80]}".to_string(),
            evidence_refs: vec![],
            error: error.map(str::to_string),
            submitted_at: chrono::Utc::now(),
        }
    }

    async fn ingestor_with_task(task: AgentTask) -> (ResultIngestor, Arc<SqliteTaskRepository>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks = Arc::new(SqliteTaskRepository::new(pool));
        tasks.create(&task).await.unwrap();
        (ResultIngestor::new(tasks.clone()), tasks)
    }

    #[tokio::test]
    async fn successful_result_marks_task_completed() {
        let task = running_task("agent_a");
        let task_id = task.id;
        let (ingestor, tasks) = ingestor_with_task(task).await;

        ingestor.ingest(result(task_id, "agent_a", None)).await.unwrap();

        let persisted = tasks.get(task_id).await.unwrap().unwrap();
        assert_eq!(persisted.status, TaskStatus::Completed);
        assert!(persisted.result.is_some());
    }

    #[tokio::test]
    async fn error_field_present_marks_task_failed_regardless_of_kind() {
        let task = running_task("agent_a");
        let task_id = task.id;
        let (ingestor, tasks) = ingestor_with_task(task).await;

        ingestor.ingest(result(task_id, "agent_a", Some("tool crashed"))).await.unwrap();

        let persisted = tasks.get(task_id).await.unwrap().unwrap();
        assert_eq!(persisted.status, TaskStatus::Failed);
        assert_eq!(persisted.error_message.as_deref(), Some("tool crashed"));
    }

    #[tokio::test]
    async fn submission_from_non_claiming_agent_is_rejected() {
        let task = running_task("agent_a");
        let task_id = task.id;
        let (ingestor, tasks) = ingestor_with_task(task).await;

        let err = ingestor.ingest(result(task_id, "agent_b", None)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        // Rejected submission must not have mutated the task's state.
        let persisted = tasks.get(task_id).await.unwrap().unwrap();
        assert_eq!(persisted.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn submission_against_non_running_task_is_rejected() {
        let mut task = running_task("agent_a");
        task.status = TaskStatus::Pending;
        task.assigned_agent_id = None;
        let task_id = task.id;
        let (ingestor, _tasks) = ingestor_with_task(task).await;

        let err = ingestor.ingest(result(task_id, "agent_a", None)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn submission_against_unknown_task_is_not_found() {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks = Arc::new(SqliteTaskRepository::new(pool));
        let ingestor = ResultIngestor::new(tasks);

        let err = ingestor.ingest(result(Uuid::new_v4(), "agent_a", None)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
