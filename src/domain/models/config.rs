//! Top-level configuration schema, loaded hierarchically by
//! [`crate::infrastructure::config::ConfigLoader`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_tick_secs")]
    pub scheduler_tick_secs: u64,
    #[serde(default = "default_local_agent_tick_secs")]
    pub local_agent_tick_secs: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_heartbeat_offline_multiplier")]
    pub heartbeat_offline_multiplier: u32,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Shared secret used to derive the AES-256 key and HMAC key for rule
    /// snapshot distribution.
    #[serde(default = "default_rule_secret")]
    pub rule_snapshot_secret: String,
    /// Directory rules are read from, one subdirectory per rule type.
    #[serde(default = "default_rule_dir")]
    pub rule_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler_tick_secs: default_tick_secs(),
            local_agent_tick_secs: default_local_agent_tick_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_offline_multiplier: default_heartbeat_offline_multiplier(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
            rule_snapshot_secret: default_rule_secret(),
            rule_dir: default_rule_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path(), max_connections: default_max_connections() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format(), log_dir: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Global dispatch rate, requests/sec across all Agents.
    #[serde(default = "default_global_rps")]
    pub global_requests_per_second: u32,
    /// Per-target dispatch rate, requests/sec against any single target.
    #[serde(default = "default_per_target_rps")]
    pub per_target_requests_per_second: u32,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_requests_per_second: default_global_rps(),
            per_target_requests_per_second: default_per_target_rps(),
            burst_size: default_burst_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr() }
    }
}

fn default_tick_secs() -> u64 {
    5
}
fn default_local_agent_tick_secs() -> u64 {
    5
}
fn default_heartbeat_interval_secs() -> u64 {
    30
}
fn default_heartbeat_offline_multiplier() -> u32 {
    3
}
fn default_db_path() -> String {
    ".scanmaster/scanmaster.db".to_string()
}
fn default_max_connections() -> u32 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_global_rps() -> u32 {
    50
}
fn default_per_target_rps() -> u32 {
    5
}
fn default_burst_size() -> u32 {
    10
}
fn default_bind_addr() -> String {
    "0.0.0.0:8443".to_string()
}
fn default_rule_secret() -> String {
    "change-me-in-production".to_string()
}
fn default_rule_dir() -> String {
    ".scanmaster/rules".to_string()
}
