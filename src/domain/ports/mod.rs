//! Domain ports (interfaces) for the scanmaster orchestration core.

pub mod agent_repository;
pub mod project_repository;
pub mod rule_repository;
pub mod target_query_provider;
pub mod task_repository;
pub mod workflow_repository;

pub use agent_repository::{AgentFilter, AgentRepository};
pub use project_repository::{ProjectFilter, ProjectRepository};
pub use rule_repository::RuleRepository;
pub use target_query_provider::{NullTargetQueryProvider, TargetQueryProvider};
pub use task_repository::{ClaimPredicate, TaskFilter, TaskRepository};
pub use workflow_repository::WorkflowRepository;
