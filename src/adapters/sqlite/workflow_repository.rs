//! SQLite implementation of the WorkflowRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{validate_acyclic, ProjectWorkflow, ScanStage, TargetPolicy, Workflow};
use crate::domain::ports::WorkflowRepository;

#[derive(Clone)]
pub struct SqliteWorkflowRepository {
    pool: SqlitePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRepository for SqliteWorkflowRepository {
    async fn create(&self, workflow: &Workflow) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO workflows (id, name, enabled, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(workflow.enabled)
        .bind(workflow.version)
        .bind(workflow.created_at.to_rfc3339())
        .bind(workflow.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Workflow>> {
        let row: Option<WorkflowRow> = sqlx::query_as("SELECT * FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, workflow: &Workflow) -> CoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE workflows SET name = ?, enabled = ?, version = ?, updated_at = ?
               WHERE id = ? AND version = ? - 1"#,
        )
        .bind(&workflow.name)
        .bind(workflow.enabled)
        .bind(workflow.version)
        .bind(workflow.updated_at.to_rfc3339())
        .bind(workflow.id.to_string())
        .bind(workflow.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!(
                "workflow {} was modified concurrently or does not exist",
                workflow.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("workflow {id}")));
        }
        Ok(())
    }

    async fn list(&self) -> CoreResult<Vec<Workflow>> {
        let rows: Vec<WorkflowRow> = sqlx::query_as("SELECT * FROM workflows ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_project(&self, project_id: Uuid) -> CoreResult<Vec<ProjectWorkflow>> {
        let rows: Vec<ProjectWorkflowRow> = sqlx::query_as(
            "SELECT * FROM project_workflows WHERE project_id = ? ORDER BY sort_order",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn bind_to_project(&self, link: &ProjectWorkflow) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO project_workflows (project_id, workflow_id, sort_order)
               VALUES (?, ?, ?)
               ON CONFLICT (project_id, workflow_id) DO UPDATE SET sort_order = excluded.sort_order"#,
        )
        .bind(link.project_id.to_string())
        .bind(link.workflow_id.to_string())
        .bind(link.sort_order)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unbind_from_project(&self, project_id: Uuid, workflow_id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM project_workflows WHERE project_id = ? AND workflow_id = ?")
            .bind(project_id.to_string())
            .bind(workflow_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_stage(&self, stage: &ScanStage) -> CoreResult<()> {
        let mut siblings = self.list_stages(stage.workflow_id).await?;
        siblings.push(stage.clone());
        validate_acyclic(&siblings)?;

        let predecessors = serde_json::to_string(&stage.predecessors)?;
        let target_policy = stage.target_policy.to_json();
        sqlx::query(
            r#"INSERT INTO scan_stages
               (id, workflow_id, name, tool_name, param_template, predecessors, target_policy,
                chunk_size, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(stage.id.to_string())
        .bind(stage.workflow_id.to_string())
        .bind(&stage.name)
        .bind(&stage.tool_name)
        .bind(&stage.param_template)
        .bind(&predecessors)
        .bind(&target_policy)
        .bind(stage.chunk_size as i64)
        .bind(stage.created_at.to_rfc3339())
        .bind(stage.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_stage(&self, id: Uuid) -> CoreResult<Option<ScanStage>> {
        let row: Option<ScanStageRow> = sqlx::query_as("SELECT * FROM scan_stages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_stage(&self, stage: &ScanStage) -> CoreResult<()> {
        let mut siblings: Vec<ScanStage> =
            self.list_stages(stage.workflow_id).await?.into_iter().filter(|s| s.id != stage.id).collect();
        siblings.push(stage.clone());
        validate_acyclic(&siblings)?;

        let predecessors = serde_json::to_string(&stage.predecessors)?;
        let target_policy = stage.target_policy.to_json();
        let result = sqlx::query(
            r#"UPDATE scan_stages SET name = ?, tool_name = ?, param_template = ?, predecessors = ?,
               target_policy = ?, chunk_size = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(&stage.name)
        .bind(&stage.tool_name)
        .bind(&stage.param_template)
        .bind(&predecessors)
        .bind(&target_policy)
        .bind(stage.chunk_size as i64)
        .bind(stage.updated_at.to_rfc3339())
        .bind(stage.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("scan stage {}", stage.id)));
        }
        Ok(())
    }

    async fn delete_stage(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM scan_stages WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("scan stage {id}")));
        }
        Ok(())
    }

    async fn list_stages(&self, workflow_id: Uuid) -> CoreResult<Vec<ScanStage>> {
        let rows: Vec<ScanStageRow> =
            sqlx::query_as("SELECT * FROM scan_stages WHERE workflow_id = ? ORDER BY created_at")
                .bind(workflow_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    id: String,
    name: String,
    enabled: bool,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = CoreError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        Ok(Workflow {
            id: Uuid::parse_str(&row.id).map_err(|e| CoreError::Validation(e.to_string()))?,
            name: row.name,
            enabled: row.enabled,
            version: row.version,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProjectWorkflowRow {
    project_id: String,
    workflow_id: String,
    sort_order: i32,
}

impl TryFrom<ProjectWorkflowRow> for ProjectWorkflow {
    type Error = CoreError;

    fn try_from(row: ProjectWorkflowRow) -> Result<Self, Self::Error> {
        Ok(ProjectWorkflow {
            project_id: Uuid::parse_str(&row.project_id).map_err(|e| CoreError::Validation(e.to_string()))?,
            workflow_id: Uuid::parse_str(&row.workflow_id).map_err(|e| CoreError::Validation(e.to_string()))?,
            sort_order: row.sort_order,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScanStageRow {
    id: String,
    workflow_id: String,
    name: String,
    tool_name: String,
    param_template: String,
    predecessors: String,
    target_policy: String,
    chunk_size: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ScanStageRow> for ScanStage {
    type Error = CoreError;

    fn try_from(row: ScanStageRow) -> Result<Self, Self::Error> {
        Ok(ScanStage {
            id: Uuid::parse_str(&row.id).map_err(|e| CoreError::Validation(e.to_string()))?,
            workflow_id: Uuid::parse_str(&row.workflow_id).map_err(|e| CoreError::Validation(e.to_string()))?,
            name: row.name,
            tool_name: row.tool_name,
            param_template: row.param_template,
            predecessors: serde_json::from_str(&row.predecessors)?,
            target_policy: TargetPolicy::parse(&row.target_policy)?,
            chunk_size: row.chunk_size.max(1) as usize,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
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

    async fn setup() -> SqliteWorkflowRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteWorkflowRepository::new(pool)
    }

    #[tokio::test]
    async fn create_and_get_workflow_round_trips() {
        let repo = setup().await;
        let workflow = Workflow::new("recon");
        repo.create(&workflow).await.unwrap();

        let fetched = repo.get(workflow.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "recon");
        assert!(fetched.enabled);
    }

    #[tokio::test]
    async fn stage_predecessors_round_trip_through_json() {
        let repo = setup().await;
        let workflow = Workflow::new("dag-test");
        repo.create(&workflow).await.unwrap();

        let a = ScanStage::new(workflow.id, "a", "nmap_portscan", 32);
        repo.create_stage(&a).await.unwrap();
        let mut b = ScanStage::new(workflow.id, "b", "nuclei_vuln", 16);
        b.predecessors.push(a.id);
        repo.create_stage(&b).await.unwrap();

        let stages = repo.list_stages(workflow.id).await.unwrap();
        let fetched_b = stages.iter().find(|s| s.id == b.id).unwrap();
        assert_eq!(fetched_b.predecessors, vec![a.id]);
    }

    #[tokio::test]
    async fn create_stage_rejects_cycle_with_existing_siblings() {
        let repo = setup().await;
        let workflow = Workflow::new("cyclic");
        repo.create(&workflow).await.unwrap();

        let mut a = ScanStage::new(workflow.id, "a", "nmap_portscan", 32);
        let mut b = ScanStage::new(workflow.id, "b", "nuclei_vuln", 16);
        a.predecessors.push(b.id);
        b.predecessors.push(a.id);
        repo.create_stage(&a).await.unwrap();

        let err = repo.create_stage(&b).await.unwrap_err();
        assert!(matches!(err, CoreError::CyclicDependency(_)));
    }

    #[tokio::test]
    async fn update_stage_rejects_cycle_introduced_later() {
        let repo = setup().await;
        let workflow = Workflow::new("cyclic-update");
        repo.create(&workflow).await.unwrap();

        let a = ScanStage::new(workflow.id, "a", "nmap_portscan", 32);
        let mut b = ScanStage::new(workflow.id, "b", "nuclei_vuln", 16);
        b.predecessors.push(a.id);
        repo.create_stage(&a).await.unwrap();
        repo.create_stage(&b).await.unwrap();

        let mut a_updated = a.clone();
        a_updated.predecessors.push(b.id);
        let err = repo.update_stage(&a_updated).await.unwrap_err();
        assert!(matches!(err, CoreError::CyclicDependency(_)));
    }

    #[tokio::test]
    async fn bind_to_project_preserves_sort_order() {
        let repo = setup().await;
        let workflow = Workflow::new("ordered");
        repo.create(&workflow).await.unwrap();
        let project_id = Uuid::new_v4();

        repo.bind_to_project(&ProjectWorkflow { project_id, workflow_id: workflow.id, sort_order: 2 })
            .await
            .unwrap();
        let links = repo.list_for_project(project_id).await.unwrap();
        assert_eq!(links[0].sort_order, 2);
    }
}
