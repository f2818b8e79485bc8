//! Core error taxonomy for the scanmaster orchestrator.
//!
//! Every error the core produces folds into [`CoreError`], classified per the
//! categories a caller (HTTP handler, scheduler tick, CLI command) needs to
//! react to: validation, authorization, not-found, conflict, policy denial,
//! transient infrastructure trouble, execution failure, and rule snapshot
//! failure. Library error types (`sqlx`, `serde_json`, cron parsing) are
//! folded in via `From` so they never leak across module boundaries.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the core domain and services.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation (bad field, out of range, malformed policy JSON).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Caller is missing or holds an invalid/expired bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request conflicts with current state (duplicate registration, illegal
    /// transition, double result submission, result from a non-claiming Agent).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Task denied by policy (scope, whitelist, or skip rule).
    #[error("policy denied: {0}")]
    PolicyDenied(String),

    /// Transient infrastructure trouble (DB contention, pool exhaustion);
    /// safe to retry on the next scheduler tick.
    #[error("transient infrastructure error: {0}")]
    Transient(String),

    /// Agent-reported or timeout-driven execution failure.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Rule snapshot build, signing, or encryption failure.
    #[error("rule snapshot failure: {0}")]
    RuleSnapshot(String),

    /// A dependency cycle was detected among a workflow's stages.
    #[error("cyclic stage dependency in workflow {0}")]
    CyclicDependency(Uuid),
}

/// Convenience alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound("row not found".to_string()),
            other => CoreError::Transient(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Validation(format!("invalid JSON: {err}"))
    }
}

impl From<cron::error::Error> for CoreError {
    fn from(err: cron::error::Error) -> Self {
        CoreError::Validation(format!("invalid cron expression: {err}"))
    }
}

impl CoreError {
    /// Whether this error represents a terminal, non-retryable outcome.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Unauthorized(_)
                | Self::NotFound(_)
                | Self::Conflict(_)
                | Self::PolicyDenied(_)
                | Self::CyclicDependency(_)
        )
    }
}
