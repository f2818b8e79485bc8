//! Agent domain model — a registered remote scan execution node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Operational status of a registered [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Maintenance,
    Exception,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
            Self::Exception => "exception",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "maintenance" => Some(Self::Maintenance),
            "exception" => Some(Self::Exception),
            _ => None,
        }
    }
}

/// A registered remote scan execution node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// `agent_<uuid>`.
    pub id: String,
    pub hostname: String,
    pub address: String,
    pub port: u16,
    pub status: AgentStatus,
    pub capabilities: HashSet<String>,
    pub tags: HashSet<String>,
    pub last_heartbeat: DateTime<Utc>,
    pub bearer_token: String,
    pub token_expiry: DateTime<Utc>,
    pub max_concurrent: u32,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Whether `self` can run `tool_name` and carries every tag in `required_tags`.
    pub fn matches(&self, tool_name: &str, required_tags: &HashSet<String>) -> bool {
        self.capabilities.contains(tool_name) && required_tags.is_subset(&self.tags)
    }

    /// Whether the last heartbeat is older than `threshold_secs`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold_secs: i64) -> bool {
        (now - self.last_heartbeat).num_seconds() > threshold_secs
    }

    pub fn token_is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.token_expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(caps: &[&str], tags: &[&str]) -> Agent {
        Agent {
            id: "agent_test".to_string(),
            hostname: "h".to_string(),
            address: "127.0.0.1".to_string(),
            port: 9000,
            status: AgentStatus::Online,
            capabilities: caps.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            last_heartbeat: Utc::now(),
            bearer_token: "tok".to_string(),
            token_expiry: Utc::now() + chrono::Duration::hours(24),
            max_concurrent: 4,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matches_requires_capability_and_tag_subset() {
        let a = agent(&["nmap_portscan"], &["zone:internal"]);
        let mut required = HashSet::new();
        required.insert("zone:internal".to_string());
        assert!(a.matches("nmap_portscan", &required));
        assert!(!a.matches("nuclei_vuln", &required));

        required.insert("zone:dmz".to_string());
        assert!(!a.matches("nmap_portscan", &required));
    }

    #[test]
    fn stale_heartbeat_detected_past_threshold() {
        let mut a = agent(&[], &[]);
        a.last_heartbeat = Utc::now() - chrono::Duration::seconds(200);
        assert!(a.is_stale(Utc::now(), 150));
        assert!(!a.is_stale(Utc::now(), 250));
    }
}
