//! SQLite implementation of the ProjectRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Project, ProjectStatus};
use crate::domain::ports::{ProjectFilter, ProjectRepository};

#[derive(Clone)]
pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, project: &Project) -> CoreResult<()> {
        let seed_targets = serde_json::to_string(&project.seed_targets)?;
        sqlx::query(
            r#"INSERT INTO projects (id, name, status, cron_expression, last_run_at, seed_targets,
               version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(project.id.to_string())
        .bind(&project.name)
        .bind(project.status.as_str())
        .bind(&project.cron_expression)
        .bind(project.last_run_at.map(|t| t.to_rfc3339()))
        .bind(&seed_targets)
        .bind(project.version)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, project: &Project) -> CoreResult<()> {
        let seed_targets = serde_json::to_string(&project.seed_targets)?;
        let result = sqlx::query(
            r#"UPDATE projects SET name = ?, status = ?, cron_expression = ?, last_run_at = ?,
               seed_targets = ?, version = ?, updated_at = ?
               WHERE id = ? AND version = ? - 1"#,
        )
        .bind(&project.name)
        .bind(project.status.as_str())
        .bind(&project.cron_expression)
        .bind(project.last_run_at.map(|t| t.to_rfc3339()))
        .bind(&seed_targets)
        .bind(project.version)
        .bind(project.updated_at.to_rfc3339())
        .bind(project.id.to_string())
        .bind(project.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!(
                "project {} was modified concurrently or does not exist",
                project.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("project {id}")));
        }
        Ok(())
    }

    async fn list(&self, filter: ProjectFilter) -> CoreResult<Vec<Project>> {
        let mut query = String::from("SELECT * FROM projects WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(pattern) = &filter.name_pattern {
            query.push_str(" AND name LIKE ?");
            bindings.push(format!("%{pattern}%"));
        }
        query.push_str(" ORDER BY created_at DESC");

        let mut q = sqlx::query_as::<_, ProjectRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let rows: Vec<ProjectRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_running(&self) -> CoreResult<Vec<Project>> {
        self.list(ProjectFilter { status: Some(ProjectStatus::Running), ..Default::default() }).await
    }

    async fn list_due(&self, now: chrono::DateTime<chrono::Utc>) -> CoreResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            "SELECT * FROM projects WHERE cron_expression IS NOT NULL AND status != 'paused' \
             AND (last_run_at IS NULL OR last_run_at <= ?)",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    status: String,
    cron_expression: Option<String>,
    last_run_at: Option<String>,
    seed_targets: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProjectRow> for Project {
    type Error = CoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let status = ProjectStatus::from_str(&row.status)
            .ok_or_else(|| CoreError::Validation(format!("invalid project status: {}", row.status)))?;

        Ok(Project {
            id: Uuid::parse_str(&row.id).map_err(|e| CoreError::Validation(e.to_string()))?,
            name: row.name,
            status,
            cron_expression: row.cron_expression,
            last_run_at: row
                .last_run_at
                .map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&chrono::Utc)))
                .transpose()
                .map_err(|e| CoreError::Validation(e.to_string()))?,
            seed_targets: serde_json::from_str(&row.seed_targets)?,
            version: row.version,
            created_at: chrono::DateTime::parse_from_rfc3339(&row.created_at)
                .map_err(|e| CoreError::Validation(e.to_string()))?
                .with_timezone(&chrono::Utc),
            updated_at: chrono::DateTime::parse_from_rfc3339(&row.updated_at)
                .map_err(|e| CoreError::Validation(e.to_string()))?
                .with_timezone(&chrono::Utc),
        })
    }
}
