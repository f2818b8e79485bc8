//! Scanmaster — master-side orchestrator for distributed vulnerability-scan
//! fleets. Hexagonal layout: `domain` holds models, ports and the error
//! taxonomy; `adapters` implements those ports against real infrastructure;
//! `services` is the application core (scheduling, dispatch, policy,
//! registry, rule snapshots); `application` and `cli` are the two front
//! doors onto that core.

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
