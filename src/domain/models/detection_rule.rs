//! DetectionRule domain model — fingerprint/vulnerability rules that feed
//! the Rule Snapshot Builder. Evaluation of a rule's matcher against
//! response data is the Agent's responsibility; the core treats it as a
//! black box (`match(data, rule)`) and only transports rules as bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::expr::Expr;

/// Where a [`DetectionRule`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    System,
    Custom,
}

impl RuleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Custom => "custom",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A fingerprint or vulnerability detection rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRule {
    pub id: Uuid,
    pub name: String,
    /// Expression tree over response fields; evaluated by Agents, not Master.
    pub matcher: Expr,
    /// CPE mapping template, e.g. `cpe:2.3:a:apache:http_server:{version}`.
    pub cpe_template: Option<String>,
    pub severity: RuleSeverity,
    pub enabled: bool,
    pub source: RuleSource,
    /// Which snapshot bucket this rule belongs to (fingerprint, poc, virus, webshell, ...).
    pub rule_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
