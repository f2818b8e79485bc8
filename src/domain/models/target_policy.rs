//! Target policy — declarative JSON embedded in a [`super::ScanStage`]
//! describing how to resolve the stage's targets.

use serde::{Deserialize, Serialize};

/// One source contributing candidate targets, in declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSourceKind {
    /// Literal values, comma- or whitespace-separated.
    Manual { value: String },
    /// Inherit the enclosing project's seed targets.
    ProjectTarget,
    /// Read targets one per line from a text file.
    File { path: String },
    /// Run a pre-registered filter against the target database.
    DbQuery { filter: serde_json::Value },
    /// A source kind not recognised by this build; skipped with a warning,
    /// never fatal, per spec.
    #[serde(other)]
    Unknown,
}

/// Declarative per-stage target resolution policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetPolicy {
    #[serde(default)]
    pub sources: Vec<TargetSourceKind>,
    /// Targets matching any whitelist entry are dropped during resolution.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Expression evaluated per-target; `true` drops the target.
    #[serde(default)]
    pub skip_rule: Option<crate::domain::models::expr::Expr>,
}

impl TargetPolicy {
    /// Parse a policy from its serialized JSON form. An empty or missing
    /// policy is the identity policy (no sources ⇒ caller falls back to
    /// seeds); only syntactically broken JSON is an error.
    pub fn parse(raw: &str) -> Result<Self, crate::domain::errors::CoreError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| crate::domain::errors::CoreError::Validation(format!("invalid target policy JSON: {e}")))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
