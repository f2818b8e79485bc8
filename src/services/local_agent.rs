//! Local Agent.
//!
//! In-process consumer of `category = system` tasks. Talks to SQLite
//! directly rather than through a Repository: tag propagation and asset
//! cleanup sweep millions of rows under a caller-supplied matcher, and
//! routing that through per-entity Repository calls would either load
//! everything into memory or bloat the Repository surface. This is the one
//! place the core deliberately keeps direct DB access.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{AgentTask, AttrMap, AttrValue, Expr, TaskCategory, TaskStatus};
use crate::domain::ports::{ClaimPredicate, TaskRepository};

const BATCH_SIZE: i64 = 100;
const CLAIM_LIMIT: usize = 10;
const LOCAL_AGENT_ID: &str = "local";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Host,
    Web,
    Network,
}

impl EntityType {
    fn table(self) -> &'static str {
        match self {
            Self::Host => "asset_hosts",
            Self::Web => "asset_webs",
            Self::Network => "asset_networks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagPropagationPayload {
    pub target_type: EntityType,
    pub action: TagAction,
    pub tag_ids: Vec<i64>,
    pub rule: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCleanupPayload {
    pub target_type: EntityType,
    pub rule: Expr,
}

/// In-process executor for `system`-category tasks.
pub struct LocalAgent {
    pool: SqlitePool,
    tasks: Arc<dyn TaskRepository>,
}

impl LocalAgent {
    pub fn new(pool: SqlitePool, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { pool, tasks }
    }

    /// One iteration of the 5s main loop.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> CoreResult<usize> {
        let claimed = self
            .tasks
            .claim_pending(TaskCategory::System, &ClaimPredicate::any(), LOCAL_AGENT_ID, CLAIM_LIMIT)
            .await?;
        let count = claimed.len();
        for task in claimed {
            self.execute(task).await;
        }
        Ok(count)
    }

    async fn execute(&self, task: AgentTask) {
        if let Err(e) = self.tasks.update_status(task.id, TaskStatus::Running).await {
            tracing::error!(task_id = %task.id, error = %e, "failed to mark system task running");
            return;
        }

        let outcome = match task.tool_name.as_str() {
            "sys_tag_propagation" => self.run_tag_propagation(&task).await,
            "sys_asset_cleanup" => self.run_asset_cleanup(&task).await,
            other => Err(CoreError::ExecutionFailed(format!("unknown system tool {other}"))),
        };

        match outcome {
            Ok(result_json) => {
                if let Err(e) = self
                    .tasks
                    .record_result(task.id, TaskStatus::Completed, Some(result_json), None)
                    .await
                {
                    tracing::error!(task_id = %task.id, error = %e, "failed to record system task result");
                }
            }
            Err(e) => self.handle_failure(&task, e).await,
        }
    }

    async fn handle_failure(&self, task: &AgentTask, error: CoreError) {
        tracing::warn!(task_id = %task.id, error = %error, "system task failed");
        if task.can_retry() {
            if let Err(e) = self.tasks.retry_task(task.id).await {
                tracing::error!(task_id = %task.id, error = %e, "failed to retry system task");
            }
        } else if let Err(e) = self
            .tasks
            .record_result(task.id, TaskStatus::Failed, None, Some(error.to_string()))
            .await
        {
            tracing::error!(task_id = %task.id, error = %e, "failed to record terminal system task failure");
        }
    }

    async fn run_tag_propagation(&self, task: &AgentTask) -> CoreResult<String> {
        let payload: TagPropagationPayload = serde_json::from_str(&task.tool_params)?;
        let table = payload.target_type.table();

        let mut processed: u64 = 0;
        let mut last_id: i64 = 0;
        loop {
            let rows = sqlx::query(&format!(
                "SELECT id, data FROM {table} WHERE id > ? ORDER BY id LIMIT ?"
            ))
            .bind(last_id)
            .bind(BATCH_SIZE)
            .fetch_all(&self.pool)
            .await?;
            if rows.is_empty() {
                break;
            }

            for row in &rows {
                let id: i64 = row.try_get("id")?;
                let data: String = row.try_get("data")?;
                last_id = id;

                let attrs = entity_attrs(&data)?;
                if !payload.rule.evaluate(&attrs) {
                    continue;
                }
                for tag_id in &payload.tag_ids {
                    match payload.action {
                        TagAction::Add => {
                            sqlx::query(
                                "INSERT OR IGNORE INTO entity_tags (entity_type, entity_id, tag_id) VALUES (?, ?, ?)",
                            )
                            .bind(serde_json::to_string(&payload.target_type)?.trim_matches('"'))
                            .bind(id)
                            .bind(tag_id)
                            .execute(&self.pool)
                            .await?;
                        }
                        TagAction::Remove => {
                            sqlx::query(
                                "DELETE FROM entity_tags WHERE entity_type = ? AND entity_id = ? AND tag_id = ?",
                            )
                            .bind(serde_json::to_string(&payload.target_type)?.trim_matches('"'))
                            .bind(id)
                            .bind(tag_id)
                            .execute(&self.pool)
                            .await?;
                        }
                    }
                }
                processed += 1;
            }

            if (rows.len() as i64) < BATCH_SIZE {
                break;
            }
        }

        Ok(serde_json::json!({
            "processed_count": processed,
            "target_type": payload.target_type,
        })
        .to_string())
    }

    async fn run_asset_cleanup(&self, task: &AgentTask) -> CoreResult<String> {
        let payload: AssetCleanupPayload = serde_json::from_str(&task.tool_params)?;
        let table = payload.target_type.table();

        let mut processed: u64 = 0;
        let mut last_id: i64 = 0;
        loop {
            let rows = sqlx::query(&format!(
                "SELECT id, data FROM {table} WHERE id > ? ORDER BY id LIMIT ?"
            ))
            .bind(last_id)
            .bind(BATCH_SIZE)
            .fetch_all(&self.pool)
            .await?;
            if rows.is_empty() {
                break;
            }

            let mut matched_ids = Vec::new();
            for row in &rows {
                let id: i64 = row.try_get("id")?;
                let data: String = row.try_get("data")?;
                last_id = id;

                let attrs = entity_attrs(&data)?;
                if payload.rule.evaluate(&attrs) {
                    matched_ids.push(id);
                }
            }

            for id in matched_ids {
                sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                processed += 1;
            }

            if (rows.len() as i64) < BATCH_SIZE {
                break;
            }
        }

        Ok(serde_json::json!({
            "processed_count": processed,
            "target_type": payload.target_type,
        })
        .to_string())
    }
}


fn entity_attrs(data_json: &str) -> CoreResult<AttrMap> {
    let value: serde_json::Value = serde_json::from_str(data_json)?;
    let mut attrs = AttrMap::new();
    if let serde_json::Value::Object(map) = value {
        for (k, v) in map {
            let attr = match v {
                serde_json::Value::String(s) => AttrValue::String(s),
                serde_json::Value::Number(n) => AttrValue::Number(n.as_f64().unwrap_or_default()),
                serde_json::Value::Bool(b) => AttrValue::Bool(b),
                _ => continue,
            };
            attrs.insert(k, attr);
        }
    }
    Ok(attrs)
}
