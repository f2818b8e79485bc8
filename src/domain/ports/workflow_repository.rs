//! Workflow repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{ProjectWorkflow, ScanStage, Workflow};

/// Repository interface for Workflow and ScanStage persistence.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn create(&self, workflow: &Workflow) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Workflow>>;

    async fn update(&self, workflow: &Workflow) -> CoreResult<()>;

    async fn delete(&self, id: Uuid) -> CoreResult<()>;

    async fn list(&self) -> CoreResult<Vec<Workflow>>;

    /// Workflows bound to a project, in `sort_order`.
    async fn list_for_project(&self, project_id: Uuid) -> CoreResult<Vec<ProjectWorkflow>>;

    async fn bind_to_project(&self, link: &ProjectWorkflow) -> CoreResult<()>;

    async fn unbind_from_project(&self, project_id: Uuid, workflow_id: Uuid) -> CoreResult<()>;

    // -- Scan stages --

    async fn create_stage(&self, stage: &ScanStage) -> CoreResult<()>;

    async fn get_stage(&self, id: Uuid) -> CoreResult<Option<ScanStage>>;

    async fn update_stage(&self, stage: &ScanStage) -> CoreResult<()>;

    async fn delete_stage(&self, id: Uuid) -> CoreResult<()>;

    /// All stages of a workflow, used for acyclicity checks and DAG walks.
    async fn list_stages(&self, workflow_id: Uuid) -> CoreResult<Vec<ScanStage>>;
}
