//! Agent Registry + Heartbeat.
//!
//! Tracks known Agents, validates registration input, issues bearer tokens,
//! and runs the background staleness sweep that flips silent Agents
//! `offline` and re-queues their in-flight work.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Agent, AgentStatus};
use crate::domain::ports::{AgentRepository, TaskRepository};

const TOKEN_TTL_HOURS: i64 = 24;
const ALLOWED_CAPABILITIES: &[&str] =
    &["nmap_portscan", "nuclei_vuln", "http_finger", "sys_tag_propagation", "sys_asset_cleanup"];

/// Input for a registration request (`POST /agent/register`).
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub hostname: String,
    pub address: String,
    pub port: u16,
    pub capabilities: HashSet<String>,
    pub tags: HashSet<String>,
    pub max_concurrent: u32,
}

#[derive(Debug, Clone)]
pub struct RegistrationResult {
    pub agent_id: String,
    pub bearer_token: String,
    pub token_expiry: chrono::DateTime<chrono::Utc>,
}

pub struct AgentRegistry {
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
}

impl AgentRegistry {
    pub fn new(agents: Arc<dyn AgentRepository>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { agents, tasks }
    }

    /// Register a new Agent. Rejects a hostname already registered under a
    /// different AgentID.
    pub async fn register(&self, req: RegistrationRequest) -> CoreResult<RegistrationResult> {
        if req.hostname.trim().is_empty() || req.hostname.len() > 255 {
            return Err(CoreError::Validation("hostname must be 1-255 characters".to_string()));
        }
        if req.port == 0 {
            return Err(CoreError::Validation("port must be in 1..=65535".to_string()));
        }
        if req.capabilities.is_empty() {
            return Err(CoreError::Validation("at least one capability is required".to_string()));
        }
        if let Some(bad) = req.capabilities.iter().find(|c| !ALLOWED_CAPABILITIES.contains(&c.as_str())) {
            return Err(CoreError::Validation(format!("unknown capability: {bad}")));
        }

        let existing = self.agents.list(crate::domain::ports::AgentFilter::default()).await?;
        if existing.iter().any(|a| a.hostname == req.hostname) {
            return Err(CoreError::Conflict(format!("hostname {} already registered", req.hostname)));
        }

        let now = chrono::Utc::now();
        let agent = Agent {
            id: format!("agent_{}", Uuid::new_v4()),
            hostname: req.hostname,
            address: req.address,
            port: req.port,
            status: AgentStatus::Online,
            capabilities: req.capabilities,
            tags: req.tags,
            last_heartbeat: now,
            bearer_token: Uuid::new_v4().to_string(),
            token_expiry: now + chrono::Duration::hours(TOKEN_TTL_HOURS),
            max_concurrent: req.max_concurrent.max(1),
            created_at: now,
        };

        self.agents.register(&agent).await?;
        tracing::info!(agent_id = %agent.id, hostname = %agent.hostname, "agent registered");

        Ok(RegistrationResult {
            agent_id: agent.id,
            bearer_token: agent.bearer_token,
            token_expiry: agent.token_expiry,
        })
    }

    /// Validate a bearer token for an authenticated request, rejecting with
    /// 401 on an invalid or expired token.
    pub async fn authenticate(&self, agent_id: &str, bearer_token: &str) -> CoreResult<Agent> {
        let agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("unknown agent {agent_id}")))?;
        if agent.bearer_token != bearer_token || !agent.token_is_valid(chrono::Utc::now()) {
            return Err(CoreError::Unauthorized("invalid or expired bearer token".to_string()));
        }
        Ok(agent)
    }

    /// Record a heartbeat. Unknown status values are rejected; unknown
    /// Agent IDs surface as `NotFound`.
    pub async fn heartbeat(&self, agent_id: &str, status: &str) -> CoreResult<()> {
        let status = AgentStatus::from_str(status)
            .ok_or_else(|| CoreError::Validation(format!("invalid agent status: {status}")))?;

        let mut agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("unknown agent {agent_id}")))?;

        agent.status = status;
        self.agents.update(&agent).await?;
        self.agents.touch_heartbeat(agent_id, chrono::Utc::now()).await
    }

    /// Background sweep (default every 60s): Agents silent past
    /// `3 * heartbeat_interval` are marked offline and their in-flight
    /// tasks re-queued.
    pub async fn sweep_stale(&self, heartbeat_interval_secs: i64, offline_multiplier: i64) -> CoreResult<u64> {
        let threshold = heartbeat_interval_secs * offline_multiplier;
        let now = chrono::Utc::now();
        let stale_before = self.agents.list_online().await?;
        let flipped = self.agents.mark_stale_offline(now, threshold).await?;

        for agent in stale_before.into_iter().filter(|a| a.is_stale(now, threshold)) {
            let filter = crate::domain::ports::TaskFilter {
                assigned_agent_id: Some(agent.id.clone()),
                ..Default::default()
            };
            for task in self.tasks.list(filter).await? {
                if !task.status.is_terminal() {
                    self.tasks.retry_task(task.id).await?;
                }
            }
        }

        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAgentRepository, SqliteTaskRepository};
    use crate::domain::models::{TaskCategory, TaskStatus};

    async fn registry() -> AgentRegistry {
        let pool = create_migrated_test_pool().await.unwrap();
        let agents = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let tasks = Arc::new(SqliteTaskRepository::new(pool));
        AgentRegistry::new(agents, tasks)
    }

    fn valid_request() -> RegistrationRequest {
        RegistrationRequest {
            hostname: "scanner-01".to_string(),
            address: "10.0.0.5".to_string(),
            port: 9100,
            capabilities: ["nmap_portscan".to_string()].into_iter().collect(),
            tags: HashSet::new(),
            max_concurrent: 4,
        }
    }

    #[tokio::test]
    async fn register_rejects_unknown_capability() {
        let registry = registry().await;
        let mut req = valid_request();
        req.capabilities = ["not_a_real_tool".to_string()].into_iter().collect();
        let err = registry.register(req).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_hostname() {
        let registry = registry().await;
        registry.register(valid_request()).await.unwrap();
        let err = registry.register(valid_request()).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn authenticate_accepts_matching_token_and_rejects_wrong_one() {
        let registry = registry().await;
        let result = registry.register(valid_request()).await.unwrap();

        registry.authenticate(&result.agent_id, &result.bearer_token).await.unwrap();
        let err = registry.authenticate(&result.agent_id, "wrong-token").await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn heartbeat_rejects_unknown_status_string() {
        let registry = registry().await;
        let result = registry.register(valid_request()).await.unwrap();
        let err = registry.heartbeat(&result.agent_id, "not_a_status").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn sweep_stale_flips_silent_agent_offline_and_requeues_its_tasks() {
        let pool = create_migrated_test_pool().await.unwrap();
        let agents = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let tasks_repo = Arc::new(SqliteTaskRepository::new(pool));
        let registry = AgentRegistry::new(agents.clone(), tasks_repo.clone());

        let result = registry.register(valid_request()).await.unwrap();
        let mut agent = agents.get(&result.agent_id).await.unwrap().unwrap();
        agent.last_heartbeat = chrono::Utc::now() - chrono::Duration::seconds(1000);
        agents.update(&agent).await.unwrap();

        let task = crate::domain::models::AgentTask {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            stage_id: Uuid::new_v4(),
            category: TaskCategory::Agent,
            tool_name: "nmap_portscan".to_string(),
            tool_params: "{}".to_string(),
            input_target: "10.0.0.1".to_string(),
            status: TaskStatus::Running,
            retry_count: 0,
            max_retries: 3,
            timeout_seconds: 1800,
            assigned_agent_id: Some(agent.id.clone()),
            policy_snapshot: "{}".to_string(),
            result: None,
            error_message: None,
            created_at: chrono::Utc::now(),
            assigned_at: Some(chrono::Utc::now()),
            started_at: Some(chrono::Utc::now()),
            ended_at: None,
        };
        tasks_repo.create(&task).await.unwrap();

        let flipped = registry.sweep_stale(60, 3).await.unwrap();
        assert_eq!(flipped, 1);

        let refreshed = agents.get(&agent.id).await.unwrap().unwrap();
        assert_eq!(refreshed.status, AgentStatus::Offline);

        let requeued = tasks_repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(requeued.status, TaskStatus::Pending);
        assert_eq!(requeued.retry_count, 1);
    }
}
