use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use scanmaster::adapters::sqlite::{connection, migrations, SqliteTaskRepository};
use scanmaster::domain::models::{AgentTask, TaskCategory, TaskStatus};
use scanmaster::domain::ports::{ClaimPredicate, TaskRepository};
use uuid::Uuid;

fn sample_task() -> AgentTask {
    let now = chrono::Utc::now();
    AgentTask {
        id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        workflow_id: Uuid::new_v4(),
        stage_id: Uuid::new_v4(),
        category: TaskCategory::Agent,
        tool_name: "nmap_portscan".to_string(),
        tool_params: "{}".to_string(),
        input_target: "10.0.0.1".to_string(),
        status: TaskStatus::Pending,
        retry_count: 0,
        max_retries: 3,
        timeout_seconds: 1800,
        assigned_agent_id: None,
        policy_snapshot: "{}".to_string(),
        result: None,
        error_message: None,
        created_at: now,
        assigned_at: None,
        started_at: None,
        ended_at: None,
    }
}

async fn seeded_repository(pending_rows: usize) -> Arc<SqliteTaskRepository> {
    let pool = connection::create_test_pool().await.unwrap();
    let migrator = migrations::Migrator::new(pool.clone());
    migrator.run_embedded_migrations(migrations::all_embedded_migrations()).await.unwrap();
    let repo = Arc::new(SqliteTaskRepository::new(pool));
    let batch: Vec<AgentTask> = (0..pending_rows).map(|_| sample_task()).collect();
    repo.create_batch(&batch).await.unwrap();
    repo
}

fn bench_claim_pending(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("claim_pending_batch_of_25_from_5000_rows", |b| {
        b.to_async(&rt).iter_batched(
            || rt.block_on(seeded_repository(5_000)),
            |repo| async move {
                let claimed = repo
                    .claim_pending(TaskCategory::Agent, &ClaimPredicate::any(), "bench-agent", 25)
                    .await
                    .unwrap();
                black_box(claimed)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_claim_pending);
criterion_main!(benches);
