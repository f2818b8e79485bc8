//! Shared fixtures for scanmaster's integration tests.

use scanmaster::adapters::sqlite::{connection, migrations};
use sqlx::SqlitePool;

/// An in-memory pool with the embedded schema already applied.
///
/// Mirrors the crate's own internal `create_migrated_test_pool` helper,
/// which is `#[cfg(test)]`-gated to the crate's unit test builds and not
/// reachable from a top-level `tests/` binary.
pub async fn migrated_pool() -> SqlitePool {
    let pool = connection::create_test_pool().await.expect("in-memory pool");
    let migrator = migrations::Migrator::new(pool.clone());
    migrator
        .run_embedded_migrations(migrations::all_embedded_migrations())
        .await
        .expect("embedded migrations");
    pool
}

#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}
