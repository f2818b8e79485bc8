//! Project domain model — a user-defined scanning engagement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a [`Project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Created but never started.
    Draft,
    /// Actively being advanced by the scheduler.
    Running,
    /// All stages completed or failed-with-retries-exhausted-but-tolerated.
    Finished,
    /// A stage hit an unrecoverable failure; the project stopped advancing.
    Error,
    /// User-paused: no new stages are materialized, in-flight tasks drain.
    Paused,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Paused => "paused",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "running" => Some(Self::Running),
            "finished" => Some(Self::Finished),
            "error" => Some(Self::Error),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

/// A user-defined scanning engagement: the root of the execution graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    /// Cron expression; `None` means manual start only.
    pub cron_expression: Option<String>,
    /// Timestamp of the most recent cron-triggered (or manual) start, used to
    /// avoid re-firing a cron project that is already running.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Seed target scope: IPs, CIDRs, or domains the project was created with.
    pub seed_targets: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, seed_targets: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: ProjectStatus::Draft,
            cron_expression: None,
            last_run_at: None,
            seed_targets,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the scheduler should consider materializing new stages for
    /// this project on the current tick.
    pub const fn is_advancing(&self) -> bool {
        matches!(self.status, ProjectStatus::Running)
    }
}
