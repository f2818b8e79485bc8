//! Target query provider port.
//!
//! Backs the `db_query` [`crate::domain::models::target_policy::TargetSourceKind`]:
//! asset inventories live outside this crate's schema, so resolving that
//! source means delegating to whatever CMDB or asset database the deployment
//! wires in.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::CoreResult;
use crate::domain::models::Target;

/// Resolves `db_query` target sources against an external asset inventory.
#[async_trait]
pub trait TargetQueryProvider: Send + Sync {
    /// Run `filter` against the inventory and return the matching targets.
    async fn query(&self, filter: &Value) -> CoreResult<Vec<Target>>;
}

/// Default provider for deployments with no asset inventory wired in.
/// Always returns an empty target list rather than failing the stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTargetQueryProvider;

#[async_trait]
impl TargetQueryProvider for NullTargetQueryProvider {
    async fn query(&self, _filter: &Value) -> CoreResult<Vec<Target>> {
        Ok(Vec::new())
    }
}
