//! AgentTask domain model — the atomic unit of work claimed by exactly one
//! Agent (remote or local), and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which consumer a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// Claimed by a remote Agent via the Dispatcher.
    Agent,
    /// Claimed by the in-process Local Agent.
    System,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::System => "system",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "agent" => Some(Self::Agent),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Classify by the legacy `sys_` tool-name prefix.
    pub fn from_tool_name(tool_name: &str) -> Self {
        if tool_name.starts_with("sys_") {
            Self::System
        } else {
            Self::Agent
        }
    }
}

/// Status of an [`AgentTask`] in its execution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states are immutable: no further transition is allowed.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status: `pending → assigned → running →
    /// {completed,failed}`, with `cancelled` reachable from any
    /// non-terminal state.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Assigned, Self::Cancelled],
            Self::Assigned => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Unit of work claimed by exactly one Agent (remote or local).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: Uuid,
    pub project_id: Uuid,
    pub workflow_id: Uuid,
    pub stage_id: Uuid,
    pub category: TaskCategory,
    pub tool_name: String,
    /// Rendered JSON parameters for this task's tool invocation.
    pub tool_params: String,
    /// The chunk this task covers, e.g. `10.0.0.0/28` or a comma-joined list.
    pub input_target: String,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub assigned_agent_id: Option<String>,
    /// Immutable copy of the stage's policy at generation time.
    pub policy_snapshot: String,
    pub result: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AgentTask {
    /// Whether this task has exceeded its `timeout_seconds` budget while
    /// `running`, as of `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        let Some(started_at) = self.started_at else { return false };
        let elapsed = (now - started_at).num_seconds().max(0) as u64;
        elapsed > self.timeout_seconds
    }

    /// Whether a retry is still permitted under `max_retries`.
    pub const fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
