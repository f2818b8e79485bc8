//! Detection rule repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::DetectionRule;

/// Repository interface for DetectionRule persistence.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn create(&self, rule: &DetectionRule) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<DetectionRule>>;

    async fn update(&self, rule: &DetectionRule) -> CoreResult<()>;

    async fn delete(&self, id: Uuid) -> CoreResult<()>;

    /// Enabled rules for a rule type, the input to the Rule Snapshot
    /// Builder.
    async fn list_enabled_by_type(&self, rule_type: &str) -> CoreResult<Vec<DetectionRule>>;

    /// Distinct rule types known to the repository, one snapshot is built
    /// per type.
    async fn list_rule_types(&self) -> CoreResult<Vec<String>>;
}
