//! SQLite implementation of the TaskRepository.
//!
//! `claim_pending` is the one query that must behave like a linearizable
//! compare-and-set: no two callers may ever claim the same task. SQLite
//! serializes writers even under
//! WAL mode, so wrapping select+update in a `BEGIN IMMEDIATE` transaction on
//! the same pool connection gives the same guarantee a `SELECT ... FOR
//! UPDATE` would on a server database, without a separate distributed lock.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{AgentTask, TaskCategory, TaskStatus};
use crate::domain::ports::{ClaimPredicate, TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &AgentTask) -> CoreResult<()> {
        insert_task(&self.pool, task).await
    }

    async fn create_batch(&self, tasks: &[AgentTask]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for task in tasks {
            insert_task(&mut *tx, task).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<AgentTask>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM agent_tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: TaskFilter) -> CoreResult<Vec<AgentTask>> {
        let mut query = String::from("SELECT * FROM agent_tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(project_id) = filter.project_id {
            query.push_str(" AND project_id = ?");
            bindings.push(project_id.to_string());
        }
        if let Some(workflow_id) = filter.workflow_id {
            query.push_str(" AND workflow_id = ?");
            bindings.push(workflow_id.to_string());
        }
        if let Some(stage_id) = filter.stage_id {
            query.push_str(" AND stage_id = ?");
            bindings.push(stage_id.to_string());
        }
        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(agent_id) = &filter.assigned_agent_id {
            query.push_str(" AND assigned_agent_id = ?");
            bindings.push(agent_id.clone());
        }
        query.push_str(" ORDER BY created_at");

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_pending_for_stage(&self, stage_id: Uuid) -> CoreResult<Vec<AgentTask>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM agent_tasks WHERE stage_id = ? AND status = 'pending'")
                .bind(stage_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_stage(&self, stage_id: Uuid) -> CoreResult<Vec<AgentTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM agent_tasks WHERE stage_id = ?")
            .bind(stage_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_overdue(&self, now: chrono::DateTime<chrono::Utc>) -> CoreResult<Vec<AgentTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM agent_tasks WHERE status = 'running' AND started_at IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        let tasks: Vec<AgentTask> = rows.into_iter().map(TryInto::try_into).collect::<CoreResult<_>>()?;
        Ok(tasks.into_iter().filter(|t| t.is_overdue(now)).collect())
    }

    async fn claim_pending(
        &self,
        category: TaskCategory,
        predicate: &ClaimPredicate,
        agent_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<AgentTask>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // `BEGIN IMMEDIATE` takes SQLite's write lock up front (rather than
        // on first write, as a bare `BEGIN` would), so no other caller can
        // race the select-then-update below under concurrent callers on
        // this pool.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let claim_result = self.claim_within_transaction(&mut conn, category, predicate, agent_id, limit).await;
        match claim_result {
            Ok(tasks) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(tasks)
            }
            Err(e) => {
                sqlx::query("ROLLBACK").execute(&mut *conn).await.ok();
                Err(e)
            }
        }
    }

    async fn update_status(&self, id: Uuid, next: TaskStatus) -> CoreResult<()> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))?;
        if !current.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "task {id} cannot transition from {:?} to {:?}",
                current.status, next
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let started_at_clause = if next == TaskStatus::Running { ", started_at = ?" } else { "" };
        let sql = format!("UPDATE agent_tasks SET status = ?{started_at_clause} WHERE id = ? AND status = ?");
        let mut q = sqlx::query(&sql).bind(next.as_str());
        if next == TaskStatus::Running {
            q = q.bind(&now);
        }
        let result = q
            .bind(id.to_string())
            .bind(current.status.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!("task {id} status changed concurrently")));
        }
        Ok(())
    }

    async fn record_result(
        &self,
        id: Uuid,
        next: TaskStatus,
        result: Option<String>,
        error_message: Option<String>,
    ) -> CoreResult<()> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))?;
        if current.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "task {id} is already in terminal state {:?}",
                current.status
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let updated = sqlx::query(
            r#"UPDATE agent_tasks SET status = ?, result = ?, error_message = ?, ended_at = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(next.as_str())
        .bind(&result)
        .bind(&error_message)
        .bind(&now)
        .bind(id.to_string())
        .bind(current.status.as_str())
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!("task {id} status changed concurrently")));
        }
        Ok(())
    }

    async fn retry_task(&self, id: Uuid) -> CoreResult<()> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))?;

        if !current.can_retry() {
            if !current.status.is_terminal() {
                sqlx::query("UPDATE agent_tasks SET status = 'failed', error_message = ? WHERE id = ?")
                    .bind("max retries exhausted")
                    .bind(id.to_string())
                    .execute(&self.pool)
                    .await?;
            }
            return Ok(());
        }

        sqlx::query(
            r#"UPDATE agent_tasks SET status = 'pending', retry_count = retry_count + 1,
               assigned_agent_id = NULL, assigned_at = NULL, started_at = NULL
               WHERE id = ?"#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_claim(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE agent_tasks SET status = 'pending', assigned_agent_id = NULL, assigned_at = NULL
               WHERE id = ? AND status = 'assigned'"#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!("task {id} is not in assigned state")));
        }
        Ok(())
    }

    async fn cancel_for_project(&self, project_id: Uuid) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE agent_tasks SET status = 'cancelled' WHERE project_id = ? \
             AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(project_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl SqliteTaskRepository {
    /// Select-then-update body of `claim_pending`, run inside the caller's
    /// `BEGIN IMMEDIATE` transaction. `capabilities` restricts candidates to
    /// matching `tool_name`s; `required_tags` is accepted for forward
    /// compatibility but has no column to match against yet, so it is
    /// ignored rather than rejecting every row.
    async fn claim_within_transaction(
        &self,
        conn: &mut sqlx::SqliteConnection,
        category: TaskCategory,
        predicate: &ClaimPredicate,
        agent_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<AgentTask>> {
        let mut query = String::from("SELECT id FROM agent_tasks WHERE status = 'pending' AND category = ?");
        let mut bindings: Vec<String> = vec![category.as_str().to_string()];

        if let Some(capabilities) = &predicate.capabilities {
            if capabilities.is_empty() {
                query.push_str(" AND 1=0");
            } else {
                let placeholders = capabilities.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                query.push_str(&format!(" AND tool_name IN ({placeholders})"));
                bindings.extend(capabilities.iter().cloned());
            }
        }
        query.push_str(" ORDER BY created_at LIMIT ?");

        let mut q = sqlx::query(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        q = q.bind(limit as i64);
        let candidate_ids: Vec<String> =
            q.fetch_all(&mut *conn).await?.into_iter().map(|r| r.get::<String, _>("id")).collect();

        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = chrono::Utc::now().to_rfc3339();
        let placeholders = candidate_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let update_sql = format!(
            "UPDATE agent_tasks SET status = 'assigned', assigned_agent_id = ?, assigned_at = ?
             WHERE id IN ({placeholders}) AND status = 'pending'"
        );
        let mut update_q = sqlx::query(&update_sql).bind(agent_id).bind(&now);
        for id in &candidate_ids {
            update_q = update_q.bind(id);
        }
        update_q.execute(&mut *conn).await?;

        let select_placeholders = candidate_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let select_sql =
            format!("SELECT * FROM agent_tasks WHERE id IN ({select_placeholders}) AND assigned_agent_id = ?");
        let mut select_q = sqlx::query_as::<_, TaskRow>(&select_sql);
        for id in &candidate_ids {
            select_q = select_q.bind(id);
        }
        select_q = select_q.bind(agent_id);
        let rows: Vec<TaskRow> = select_q.fetch_all(&mut *conn).await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

async fn insert_task<'e, E>(executor: E, task: &AgentTask) -> CoreResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"INSERT INTO agent_tasks
           (id, project_id, workflow_id, stage_id, category, tool_name, tool_params, input_target,
            status, retry_count, max_retries, timeout_seconds, assigned_agent_id, policy_snapshot,
            result, error_message, created_at, assigned_at, started_at, ended_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(task.id.to_string())
    .bind(task.project_id.to_string())
    .bind(task.workflow_id.to_string())
    .bind(task.stage_id.to_string())
    .bind(task.category.as_str())
    .bind(&task.tool_name)
    .bind(&task.tool_params)
    .bind(&task.input_target)
    .bind(task.status.as_str())
    .bind(task.retry_count)
    .bind(task.max_retries)
    .bind(task.timeout_seconds as i64)
    .bind(&task.assigned_agent_id)
    .bind(&task.policy_snapshot)
    .bind(&task.result)
    .bind(&task.error_message)
    .bind(task.created_at.to_rfc3339())
    .bind(task.assigned_at.map(|t| t.to_rfc3339()))
    .bind(task.started_at.map(|t| t.to_rfc3339()))
    .bind(task.ended_at.map(|t| t.to_rfc3339()))
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    project_id: String,
    workflow_id: String,
    stage_id: String,
    category: String,
    tool_name: String,
    tool_params: String,
    input_target: String,
    status: String,
    retry_count: i64,
    max_retries: i64,
    timeout_seconds: i64,
    assigned_agent_id: Option<String>,
    policy_snapshot: String,
    result: Option<String>,
    error_message: Option<String>,
    created_at: String,
    assigned_at: Option<String>,
    started_at: Option<String>,
    ended_at: Option<String>,
}

impl TryFrom<TaskRow> for AgentTask {
    type Error = CoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(AgentTask {
            id: Uuid::parse_str(&row.id).map_err(|e| CoreError::Validation(e.to_string()))?,
            project_id: Uuid::parse_str(&row.project_id).map_err(|e| CoreError::Validation(e.to_string()))?,
            workflow_id: Uuid::parse_str(&row.workflow_id).map_err(|e| CoreError::Validation(e.to_string()))?,
            stage_id: Uuid::parse_str(&row.stage_id).map_err(|e| CoreError::Validation(e.to_string()))?,
            category: TaskCategory::from_str(&row.category)
                .ok_or_else(|| CoreError::Validation(format!("invalid task category: {}", row.category)))?,
            tool_name: row.tool_name,
            tool_params: row.tool_params,
            input_target: row.input_target,
            status: TaskStatus::from_str(&row.status)
                .ok_or_else(|| CoreError::Validation(format!("invalid task status: {}", row.status)))?,
            retry_count: row.retry_count as u32,
            max_retries: row.max_retries as u32,
            timeout_seconds: row.timeout_seconds as u64,
            assigned_agent_id: row.assigned_agent_id,
            policy_snapshot: row.policy_snapshot,
            result: row.result,
            error_message: row.error_message,
            created_at: parse_ts(&row.created_at)?,
            assigned_at: row.assigned_at.as_deref().map(parse_ts).transpose()?,
            started_at: row.started_at.as_deref().map(parse_ts).transpose()?,
            ended_at: row.ended_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

fn parse_ts(raw: &str) -> CoreResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&chrono::Utc))
        .map_err(|e| CoreError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn setup() -> SqliteTaskRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteTaskRepository::new(pool)
    }

    fn sample_task(tool_name: &str) -> AgentTask {
        let now = chrono::Utc::now();
        AgentTask {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            stage_id: Uuid::new_v4(),
            category: TaskCategory::Agent,
            tool_name: tool_name.to_string(),
            tool_params: "{}".to_string(),
            input_target: "10.0.0.1".to_string(),
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: 3,
            timeout_seconds: 1800,
            assigned_agent_id: None,
            policy_snapshot: "{}".to_string(),
            result: None,
            error_message: None,
            created_at: now,
            assigned_at: None,
            started_at: None,
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let repo = setup().await;
        let task = sample_task("nmap_portscan");
        repo.create(&task).await.unwrap();

        let fetched = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.tool_name, "nmap_portscan");
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn claim_pending_moves_to_assigned_and_stamps_agent() {
        let repo = setup().await;
        let task = sample_task("nmap_portscan");
        repo.create(&task).await.unwrap();

        let claimed = repo
            .claim_pending(TaskCategory::Agent, &ClaimPredicate::any(), "agent_1", 10)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].status, TaskStatus::Assigned);
        assert_eq!(claimed[0].assigned_agent_id.as_deref(), Some("agent_1"));
    }

    #[tokio::test]
    async fn claim_pending_respects_capability_predicate() {
        let repo = setup().await;
        repo.create(&sample_task("nmap_portscan")).await.unwrap();
        repo.create(&sample_task("nuclei_vuln")).await.unwrap();

        let mut caps = HashSet::new();
        caps.insert("nmap_portscan".to_string());
        let predicate = ClaimPredicate::matching(caps, HashSet::new());

        let claimed = repo.claim_pending(TaskCategory::Agent, &predicate, "agent_1", 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].tool_name, "nmap_portscan");
    }

    #[tokio::test]
    async fn concurrent_claims_never_double_deliver_same_task() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = Arc::new(SqliteTaskRepository::new(pool));
        let task = sample_task("nmap_portscan");
        repo.create(&task).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.claim_pending(TaskCategory::Agent, &ClaimPredicate::any(), &format!("agent_{i}"), 1)
                    .await
                    .unwrap()
            }));
        }

        let mut total_claimed = 0;
        for handle in handles {
            total_claimed += handle.await.unwrap().len();
        }
        assert_eq!(total_claimed, 1, "exactly one caller should have claimed the pending task");
    }

    #[tokio::test]
    async fn update_status_rejects_invalid_transition() {
        let repo = setup().await;
        let task = sample_task("nmap_portscan");
        repo.create(&task).await.unwrap();

        let err = repo.update_status(task.id, TaskStatus::Completed).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn retry_task_increments_count_until_exhausted() {
        let repo = setup().await;
        let mut task = sample_task("nmap_portscan");
        task.max_retries = 1;
        repo.create(&task).await.unwrap();
        repo.update_status(task.id, TaskStatus::Assigned).await.unwrap();
        repo.update_status(task.id, TaskStatus::Running).await.unwrap();

        repo.retry_task(task.id).await.unwrap();
        let after_first = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(after_first.status, TaskStatus::Pending);
        assert_eq!(after_first.retry_count, 1);

        repo.update_status(task.id, TaskStatus::Assigned).await.unwrap();
        repo.update_status(task.id, TaskStatus::Running).await.unwrap();
        repo.retry_task(task.id).await.unwrap();
        let after_second = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(after_second.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn release_claim_requeues_without_incrementing_retry_count() {
        let repo = setup().await;
        let task = sample_task("nmap_portscan");
        repo.create(&task).await.unwrap();
        repo.claim_pending(TaskCategory::Agent, &ClaimPredicate::any(), "agent_1", 10).await.unwrap();

        repo.release_claim(task.id).await.unwrap();

        let after = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Pending);
        assert_eq!(after.retry_count, 0);
        assert!(after.assigned_agent_id.is_none());
    }

    #[tokio::test]
    async fn release_claim_rejects_non_assigned_task() {
        let repo = setup().await;
        let task = sample_task("nmap_portscan");
        repo.create(&task).await.unwrap();

        assert!(repo.release_claim(task.id).await.is_err());
    }
}
