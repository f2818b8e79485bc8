//! Agent repository port.

use async_trait::async_trait;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Agent, AgentStatus};

/// Filter criteria for listing agents.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub status: Option<AgentStatus>,
    pub capability: Option<String>,
    pub tag: Option<String>,
}

/// Repository interface for Agent persistence.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn register(&self, agent: &Agent) -> CoreResult<()>;

    async fn get(&self, id: &str) -> CoreResult<Option<Agent>>;

    async fn update(&self, agent: &Agent) -> CoreResult<()>;

    async fn list(&self, filter: AgentFilter) -> CoreResult<Vec<Agent>>;

    async fn list_online(&self) -> CoreResult<Vec<Agent>>;

    /// Record a heartbeat: bumps `last_heartbeat` and, if the Agent was
    /// `Offline`, flips it back to `Online`.
    async fn touch_heartbeat(&self, id: &str, at: chrono::DateTime<chrono::Utc>) -> CoreResult<()>;

    /// Mark Agents whose heartbeat is older than `threshold_secs` as
    /// `Offline`. Returns the number of Agents transitioned.
    async fn mark_stale_offline(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        threshold_secs: i64,
    ) -> CoreResult<u64>;

    async fn deregister(&self, id: &str) -> CoreResult<()>;
}
