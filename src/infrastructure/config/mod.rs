//! Configuration management infrastructure.
//!
//! Hierarchical configuration using figment:
//! - programmatic defaults
//! - `scanmaster.yaml`
//! - `SCANMASTER_`-prefixed environment variables

mod loader;

pub use loader::{ConfigError, ConfigLoader};
