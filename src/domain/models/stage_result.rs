//! StageResult domain model — the payload an Agent submits on completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    PortScan,
    WebFinger,
    Vuln,
    SystemOp,
}

/// Result payload submitted by an Agent for a completed (or failed) task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub task_id: Uuid,
    pub agent_id: String,
    pub kind: ResultKind,
    /// Raw, tool-specific result payload, serialized JSON.
    pub payload: String,
    /// Pointers to archived evidence blobs (paths or object-store keys).
    pub evidence_refs: Vec<String>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
