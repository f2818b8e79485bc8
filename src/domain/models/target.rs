//! A resolved scan target: the output of the Target Provider.

use serde::{Deserialize, Serialize};

/// How a [`Target`] was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Ip,
    Cidr,
    Domain,
    Unknown,
}

impl TargetType {
    /// Best-effort classification of a raw target string.
    pub fn classify(value: &str) -> Self {
        if value.contains('/') {
            Self::Cidr
        } else if value.parse::<std::net::IpAddr>().is_ok() {
            Self::Ip
        } else if value.contains('.') && !value.chars().next().is_some_and(|c| c.is_ascii_digit())
        {
            Self::Domain
        } else {
            Self::Unknown
        }
    }
}

/// A single resolved target, tagged with its type and originating source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub value: String,
    pub target_type: TargetType,
    /// Which [`super::target_policy::TargetSourceKind`] produced this target,
    /// kept for diagnostics (e.g. distinguishing `manual` from `project_target`).
    pub source: String,
}

impl Target {
    pub fn new(value: impl Into<String>, source: impl Into<String>) -> Self {
        let value = value.into();
        let target_type = TargetType::classify(&value);
        Self { value, target_type, source: source.into() }
    }

    /// Key used for deduplication: `(value, type)` per spec P7.
    pub fn dedup_key(&self) -> (String, TargetType) {
        (self.value.clone(), self.target_type)
    }
}
