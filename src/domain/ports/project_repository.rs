//! Project repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Project, ProjectStatus};

/// Filter criteria for listing projects.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub name_pattern: Option<String>,
}

/// Repository interface for Project persistence.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: &Project) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Project>>;

    /// Update a project, enforcing optimistic concurrency on `version`.
    async fn update(&self, project: &Project) -> CoreResult<()>;

    async fn delete(&self, id: Uuid) -> CoreResult<()>;

    async fn list(&self, filter: ProjectFilter) -> CoreResult<Vec<Project>>;

    /// Projects currently `Running`, the set the Scheduler walks each tick.
    async fn list_running(&self) -> CoreResult<Vec<Project>>;

    /// Projects with a `cron_expression` due to fire at or before `now`.
    async fn list_due(&self, now: chrono::DateTime<chrono::Utc>) -> CoreResult<Vec<Project>>;
}
