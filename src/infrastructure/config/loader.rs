use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid scheduler_tick_secs: {0}, must be at least 1")]
    InvalidTickSecs(u64),

    #[error("invalid heartbeat_interval_secs: {0}, must be at least 1")]
    InvalidHeartbeatInterval(u64),

    #[error("invalid log level: {0}, must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}, must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_connections: {0}, must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid burst_size: {0}, must be at least 1")]
    InvalidBurstSize(u32),

    #[error("rule_snapshot_secret cannot be empty")]
    EmptyRuleSecret,
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Serialized`)
    /// 2. `scanmaster.yaml`, if present in the working directory
    /// 3. `SCANMASTER_`-prefixed environment variables, `__`-nested
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("scanmaster.yaml"))
            .merge(Env::prefixed("SCANMASTER_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, ignoring `scanmaster.yaml`
    /// in the working directory. Used by tests and the CLI's `--config` flag.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("SCANMASTER_").split("__"))
            .extract()
            .context(format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.scheduler_tick_secs == 0 {
            return Err(ConfigError::InvalidTickSecs(config.scheduler_tick_secs));
        }
        if config.heartbeat_interval_secs == 0 {
            return Err(ConfigError::InvalidHeartbeatInterval(config.heartbeat_interval_secs));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        if config.rule_snapshot_secret.is_empty() {
            return Err(ConfigError::EmptyRuleSecret);
        }

        Ok(())
    }
}
