//! ScanStage domain model — one node in a workflow's execution DAG.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::target_policy::TargetPolicy;

/// One node in a [`super::Workflow`]'s execution DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStage {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    /// Logical tool name, e.g. `nmap_portscan`, `nuclei_vuln`, `sys_tag_propagation`.
    pub tool_name: String,
    /// Serialized JSON parameter template, rendered at generation time.
    pub param_template: String,
    /// Stage ids that must be `completed` before this stage may materialize.
    pub predecessors: Vec<Uuid>,
    pub target_policy: TargetPolicy,
    /// Maximum targets per emitted task.
    pub chunk_size: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanStage {
    pub fn new(
        workflow_id: Uuid,
        name: impl Into<String>,
        tool_name: impl Into<String>,
        chunk_size: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            name: name.into(),
            tool_name: tool_name.into(),
            param_template: "{}".to_string(),
            predecessors: Vec::new(),
            target_policy: TargetPolicy::default(),
            chunk_size: chunk_size.max(1),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this stage self-references or names itself in the wrong
    /// place — a narrower, cheap check separate from whole-workflow cycle
    /// detection (see [`crate::services::dag`]).
    pub fn has_self_dependency(&self) -> bool {
        self.predecessors.contains(&self.id)
    }

    /// Whether this stage's category is `system` (executed in-process by
    /// the Local Agent) rather than `agent` (dispatched to remote Agents).
    /// The `sys_` prefix is a legacy convention, not authoritative — callers
    /// that maintain an explicit tool registry should prefer that instead.
    pub fn is_system_tool(&self) -> bool {
        self.tool_name.starts_with("sys_")
    }
}

/// Validates that a set of stages belonging to one workflow forms a DAG:
/// no self-reference, no cycles, and every predecessor id actually belongs
/// to the same workflow.
pub fn validate_acyclic(stages: &[ScanStage]) -> Result<(), crate::domain::errors::CoreError> {
    use std::collections::{HashMap, HashSet};

    let by_id: HashMap<Uuid, &ScanStage> = stages.iter().map(|s| (s.id, s)).collect();

    for stage in stages {
        if stage.has_self_dependency() {
            return Err(crate::domain::errors::CoreError::Validation(format!(
                "stage {} depends on itself",
                stage.id
            )));
        }
        for pred in &stage.predecessors {
            if !by_id.contains_key(pred) {
                return Err(crate::domain::errors::CoreError::Validation(format!(
                    "stage {} references unknown predecessor {}",
                    stage.id, pred
                )));
            }
        }
    }

    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();

    fn visit(
        id: Uuid,
        by_id: &HashMap<Uuid, &ScanStage>,
        visited: &mut HashSet<Uuid>,
        on_stack: &mut HashSet<Uuid>,
    ) -> Result<(), Uuid> {
        if on_stack.contains(&id) {
            return Err(id);
        }
        if visited.contains(&id) {
            return Ok(());
        }
        visited.insert(id);
        on_stack.insert(id);
        if let Some(stage) = by_id.get(&id) {
            for pred in &stage.predecessors {
                visit(*pred, by_id, visited, on_stack)?;
            }
        }
        on_stack.remove(&id);
        Ok(())
    }

    for stage in stages {
        if visit(stage.id, &by_id, &mut visited, &mut on_stack).is_err() {
            return Err(crate::domain::errors::CoreError::CyclicDependency(stage.workflow_id));
        }
    }

    Ok(())
}
