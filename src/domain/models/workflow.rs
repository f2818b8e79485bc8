//! Workflow domain model — a reusable, ordered collection of scan stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reusable template grouping [`crate::domain::models::ScanStage`]s into a DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            enabled: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Join row attaching a [`Workflow`] to a [`crate::domain::models::Project`]
/// with an explicit sort order (workflows are reusable across projects).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWorkflow {
    pub project_id: Uuid,
    pub workflow_id: Uuid,
    pub sort_order: i32,
}
