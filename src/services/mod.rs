//! Application services for the scanmaster orchestration core. Each
//! service corresponds to one component from the system overview (C1 is
//! the Task Store port itself, implemented under `adapters::sqlite`).

pub mod agent_registry;
pub mod local_agent;
pub mod policy_enforcer;
pub mod rate_limiter;
pub mod result_ingestor;
pub mod rule_snapshot_builder;
pub mod scheduler;
pub mod target_resolver;
pub mod task_dispatcher;
pub mod task_generator;

pub use agent_registry::{AgentRegistry, RegistrationRequest, RegistrationResult};
pub use local_agent::{AssetCleanupPayload, EntityType, LocalAgent, TagAction, TagPropagationPayload};
pub use policy_enforcer::{GlobalPolicy, PolicyDecision, PolicyEnforcer};
pub use rate_limiter::{DispatchRateLimiter, SharedRateLimiter};
pub use result_ingestor::ResultIngestor;
pub use rule_snapshot_builder::RuleSnapshotBuilder;
pub use scheduler::{GlobalPolicyDefaults, Scheduler, TickReport};
pub use target_resolver::TargetResolver;
pub use task_dispatcher::{DispatchOutcome, TaskDispatcher};
pub use task_generator::TaskGenerator;
