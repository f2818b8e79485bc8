//! Ambient infrastructure: configuration loading and logging setup. Neither
//! module touches domain logic — they exist so the binary has a config file
//! and a subscriber before it wires up the core.

pub mod config;
pub mod logging;
