//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Agent, AgentStatus};
use crate::domain::ports::{AgentFilter, AgentRepository};

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn register(&self, agent: &Agent) -> CoreResult<()> {
        let capabilities = serde_json::to_string(&agent.capabilities)?;
        let tags = serde_json::to_string(&agent.tags)?;
        sqlx::query(
            r#"INSERT INTO agents
               (id, hostname, address, port, status, capabilities, tags, last_heartbeat,
                bearer_token, token_expiry, max_concurrent, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&agent.id)
        .bind(&agent.hostname)
        .bind(&agent.address)
        .bind(agent.port as i64)
        .bind(agent.status.as_str())
        .bind(&capabilities)
        .bind(&tags)
        .bind(agent.last_heartbeat.to_rfc3339())
        .bind(&agent.bearer_token)
        .bind(agent.token_expiry.to_rfc3339())
        .bind(agent.max_concurrent as i64)
        .bind(agent.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> CoreResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, agent: &Agent) -> CoreResult<()> {
        let capabilities = serde_json::to_string(&agent.capabilities)?;
        let tags = serde_json::to_string(&agent.tags)?;
        let result = sqlx::query(
            r#"UPDATE agents SET hostname = ?, address = ?, port = ?, status = ?, capabilities = ?,
               tags = ?, last_heartbeat = ?, bearer_token = ?, token_expiry = ?, max_concurrent = ?
               WHERE id = ?"#,
        )
        .bind(&agent.hostname)
        .bind(&agent.address)
        .bind(agent.port as i64)
        .bind(agent.status.as_str())
        .bind(&capabilities)
        .bind(&tags)
        .bind(agent.last_heartbeat.to_rfc3339())
        .bind(&agent.bearer_token)
        .bind(agent.token_expiry.to_rfc3339())
        .bind(agent.max_concurrent as i64)
        .bind(&agent.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("agent {}", agent.id)));
        }
        Ok(())
    }

    async fn list(&self, filter: AgentFilter) -> CoreResult<Vec<Agent>> {
        let mut query = String::from("SELECT * FROM agents WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(capability) = &filter.capability {
            query.push_str(" AND capabilities LIKE ?");
            bindings.push(format!("%\"{capability}\"%"));
        }
        if let Some(tag) = &filter.tag {
            query.push_str(" AND tags LIKE ?");
            bindings.push(format!("%\"{tag}\"%"));
        }
        query.push_str(" ORDER BY hostname");

        let mut q = sqlx::query_as::<_, AgentRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let rows: Vec<AgentRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_online(&self) -> CoreResult<Vec<Agent>> {
        self.list(AgentFilter { status: Some(AgentStatus::Online), ..Default::default() }).await
    }

    async fn touch_heartbeat(&self, id: &str, at: chrono::DateTime<chrono::Utc>) -> CoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE agents SET last_heartbeat = ?,
               status = CASE WHEN status = 'offline' THEN 'online' ELSE status END
               WHERE id = ?"#,
        )
        .bind(at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("agent {id}")));
        }
        Ok(())
    }

    async fn mark_stale_offline(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        threshold_secs: i64,
    ) -> CoreResult<u64> {
        let cutoff = now - chrono::Duration::seconds(threshold_secs);
        let result = sqlx::query(
            "UPDATE agents SET status = 'offline' WHERE status != 'offline' AND last_heartbeat <= ?",
        )
        .bind(cutoff.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn deregister(&self, id: &str) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("agent {id}")));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    hostname: String,
    address: String,
    port: i64,
    status: String,
    capabilities: String,
    tags: String,
    last_heartbeat: String,
    bearer_token: String,
    token_expiry: String,
    max_concurrent: i64,
    created_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = CoreError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        Ok(Agent {
            id: row.id,
            hostname: row.hostname,
            address: row.address,
            port: row.port as u16,
            status: AgentStatus::from_str(&row.status)
                .ok_or_else(|| CoreError::Validation(format!("invalid agent status: {}", row.status)))?,
            capabilities: serde_json::from_str::<HashSet<String>>(&row.capabilities)?,
            tags: serde_json::from_str::<HashSet<String>>(&row.tags)?,
            last_heartbeat: parse_ts(&row.last_heartbeat)?,
            bearer_token: row.bearer_token,
            token_expiry: parse_ts(&row.token_expiry)?,
            max_concurrent: row.max_concurrent as u32,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

fn parse_ts(raw: &str) -> CoreResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&chrono::Utc))
        .map_err(|e| CoreError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup() -> SqliteAgentRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteAgentRepository::new(pool)
    }

    fn sample_agent(hostname: &str) -> Agent {
        let now = chrono::Utc::now();
        let mut caps = HashSet::new();
        caps.insert("nmap_portscan".to_string());
        Agent {
            id: format!("agent_{hostname}"),
            hostname: hostname.to_string(),
            address: "10.0.0.5".to_string(),
            port: 9443,
            status: AgentStatus::Online,
            capabilities: caps,
            tags: HashSet::new(),
            last_heartbeat: now,
            bearer_token: "tok".to_string(),
            token_expiry: now + chrono::Duration::hours(24),
            max_concurrent: 4,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn register_and_get_round_trips() {
        let repo = setup().await;
        let agent = sample_agent("scanner-1");
        repo.register(&agent).await.unwrap();

        let fetched = repo.get(&agent.id).await.unwrap().unwrap();
        assert_eq!(fetched.hostname, "scanner-1");
        assert!(fetched.capabilities.contains("nmap_portscan"));
    }

    #[tokio::test]
    async fn touch_heartbeat_revives_offline_agent() {
        let repo = setup().await;
        let mut agent = sample_agent("scanner-2");
        agent.status = AgentStatus::Offline;
        repo.register(&agent).await.unwrap();

        repo.touch_heartbeat(&agent.id, chrono::Utc::now()).await.unwrap();
        let fetched = repo.get(&agent.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AgentStatus::Online);
    }

    #[tokio::test]
    async fn mark_stale_offline_flips_only_expired_agents() {
        let repo = setup().await;
        let mut stale = sample_agent("stale-one");
        stale.last_heartbeat = chrono::Utc::now() - chrono::Duration::seconds(500);
        repo.register(&stale).await.unwrap();
        repo.register(&sample_agent("fresh-one")).await.unwrap();

        let flipped = repo.mark_stale_offline(chrono::Utc::now(), 300).await.unwrap();
        assert_eq!(flipped, 1);

        let fetched = repo.get(&stale.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AgentStatus::Offline);
    }
}
