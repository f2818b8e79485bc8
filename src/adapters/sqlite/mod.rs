//! SQLite adapter: connection pooling, embedded migrations, and one
//! repository implementation per `domain::ports` trait.

pub mod agent_repository;
pub mod connection;
pub mod migrations;
pub mod project_repository;
pub mod rule_repository;
pub mod task_repository;
pub mod workflow_repository;

pub use agent_repository::SqliteAgentRepository;
pub use project_repository::SqliteProjectRepository;
pub use rule_repository::SqliteRuleRepository;
pub use task_repository::SqliteTaskRepository;
pub use workflow_repository::SqliteWorkflowRepository;

use sqlx::SqlitePool;

/// Test helper: an in-memory pool with the embedded migrations already
/// applied, used by every repository's `#[cfg(test)]` module.
#[cfg(test)]
pub async fn create_migrated_test_pool() -> Result<SqlitePool, Box<dyn std::error::Error>> {
    let pool = connection::create_test_pool().await?;
    let migrator = migrations::Migrator::new(pool.clone());
    migrator.run_embedded_migrations(migrations::all_embedded_migrations()).await?;
    Ok(pool)
}
