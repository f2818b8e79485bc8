//! End-to-end HTTP coverage of the Agent-facing wire contract (spec.md §6):
//! register, authenticate, fetch a matching task, submit its result.

mod common;

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use scanmaster::adapters::sqlite::{SqliteAgentRepository, SqliteTaskRepository};
use scanmaster::application::http::{router, AppState};
use scanmaster::domain::models::{AgentTask, TaskCategory, TaskStatus};
use scanmaster::domain::ports::TaskRepository;
use scanmaster::services::{
    AgentRegistry, DispatchRateLimiter, GlobalPolicyDefaults, ResultIngestor, RuleSnapshotBuilder, TaskDispatcher,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn test_state() -> (AppState, Arc<dyn TaskRepository>, tempfile::TempDir) {
    let pool = common::migrated_pool().await;
    let agents: Arc<dyn scanmaster::domain::ports::AgentRepository> =
        Arc::new(SqliteAgentRepository::new(pool.clone()));
    let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool));

    let rate_limiter = Arc::new(DispatchRateLimiter::new(&scanmaster::domain::models::RateLimitConfig {
        global_requests_per_second: 1_000,
        per_target_requests_per_second: 1_000,
        burst_size: 1_000,
    }));
    let rule_dir = tempfile::tempdir().unwrap();

    let state = AppState {
        agents: Arc::new(AgentRegistry::new(agents, tasks.clone())),
        dispatcher: Arc::new(TaskDispatcher::new(tasks.clone(), rate_limiter)),
        results: Arc::new(ResultIngestor::new(tasks.clone())),
        tasks: tasks.clone(),
        rule_snapshots: Arc::new(RuleSnapshotBuilder::new(rule_dir.path(), "it-shared-secret")),
        policy_defaults: Arc::new(GlobalPolicyDefaults::default()),
    };
    (state, tasks, rule_dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn register_then_fetch_then_submit_result_round_trips() {
    let (state, tasks, _rule_dir) = test_state().await;
    let app = router(state);

    let register_body = json!({
        "hostname": "scanner-it-01",
        "ip_address": "10.5.0.2",
        "port": 9100,
        "version": "1.0.0",
        "os": "linux",
        "arch": "x86_64",
        "cpu_cores": 4,
        "memory_total": 8_000_000_000u64,
        "disk_total": 100_000_000_000u64,
        "capabilities": ["nmap_portscan"],
        "tags": [],
    });
    let register_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/agent/register")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(register_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(register_response.status(), StatusCode::OK);
    let registered = body_json(register_response).await;
    let agent_id = registered["agent_id"].as_str().unwrap().to_string();
    let token = registered["grpc_token"].as_str().unwrap().to_string();

    let task = AgentTask {
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
        created_at: chrono::Utc::now(),
        assigned_at: None,
        started_at: None,
        ended_at: None,
    };
    let task_id = task.id;
    tasks.create(&task).await.unwrap();

    let fetch_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/agent/tasks")
                .header("x-agent-id", &agent_id)
                .header("authorization", format!("Bearer {token}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(fetch_response.status(), StatusCode::OK);
    let claimed: Value = body_json(fetch_response).await;
    let claimed = claimed.as_array().unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0]["task_id"].as_str().unwrap(), task_id.to_string());

    let result_body = json!({
        "agent_id": agent_id,
        "kind": "port_scan",
        "payload": "{\"open_ports\":[22]}",
        "evidence_refs": [],
    });
    let result_response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/agent/tasks/{task_id}/result"))
                .header("content-type", "application/json")
                .header("x-agent-id", &agent_id)
                .header("authorization", format!("Bearer {token}"))
                .body(axum::body::Body::from(result_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(result_response.status(), StatusCode::OK);

    let persisted = tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(persisted.status, TaskStatus::Completed);
}

#[tokio::test]
async fn heartbeat_without_bearer_token_is_rejected() {
    let (state, _tasks, _rule_dir) = test_state().await;
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/agent/heartbeat")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(json!({"agent_id": "agent_x", "status": "online"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_result_without_bearer_token_is_rejected() {
    let (state, tasks, _rule_dir) = test_state().await;
    let app = router(state);

    let task_id = Uuid::new_v4();
    let result_body = json!({
        "agent_id": "agent_x",
        "kind": "port_scan",
        "payload": "{}",
        "evidence_refs": [],
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/agent/tasks/{task_id}/result"))
                .header("content-type", "application/json")
                .body(axum::body::Body::from(result_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(tasks.get(task_id).await.unwrap().is_none());
}
