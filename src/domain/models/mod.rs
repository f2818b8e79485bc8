//! Plain data structures describing Master-side state. No persistence or
//! I/O lives here — see `domain::ports` for the traits that move these
//! types in and out of storage.

pub mod agent;
pub mod agent_task;
pub mod config;
pub mod detection_rule;
pub mod expr;
pub mod project;
pub mod rule_snapshot;
pub mod scan_stage;
pub mod stage_result;
pub mod target;
pub mod target_policy;
pub mod workflow;

pub use agent::{Agent, AgentStatus};
pub use agent_task::{AgentTask, TaskCategory, TaskStatus};
pub use config::{Config, DatabaseConfig, HttpConfig, LoggingConfig, RateLimitConfig};
pub use detection_rule::{DetectionRule, RuleSeverity, RuleSource};
pub use expr::{AttrMap, AttrValue, Expr, Leaf, Operator};
pub use project::{Project, ProjectStatus};
pub use rule_snapshot::RuleSnapshot;
pub use scan_stage::{validate_acyclic, ScanStage};
pub use stage_result::{ResultKind, StageResult};
pub use target::{Target, TargetType};
pub use target_policy::{TargetPolicy, TargetSourceKind};
pub use workflow::{ProjectWorkflow, Workflow};
