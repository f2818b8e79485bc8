//! Dispatch rate limiting (spec.md §4.6, §5, §9 "named component, no hidden
//! singletons"). Two independently owned token buckets: one global (protects
//! the Master from being overwhelmed by polling Agents), one keyed per
//! target (protects the scan subject from concurrent over-scanning).

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::{Quota, RateLimiter as GovernorLimiter};

use crate::domain::models::RateLimitConfig;

const FALLBACK_RATE: NonZeroU32 = NonZeroU32::new(1).unwrap();

type GlobalLimiter = GovernorLimiter<governor::state::direct::NotKeyed, governor::state::InMemoryState, DefaultClock>;
type KeyedLimiter =
    GovernorLimiter<String, governor::state::keyed::DefaultKeyedStateStore<String>, DefaultClock>;

/// Owns the Dispatcher's rate-limit token buckets. Exhausted limits yield
/// `false`, the caller's signal to return an empty task list (a `busy`
/// response the Agent is expected to back off from).
pub struct DispatchRateLimiter {
    global: GlobalLimiter,
    per_target: KeyedLimiter,
}

impl DispatchRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let global_rps = NonZeroU32::new(config.global_requests_per_second).unwrap_or(FALLBACK_RATE);
        let per_target_rps =
            NonZeroU32::new(config.per_target_requests_per_second).unwrap_or(FALLBACK_RATE);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(FALLBACK_RATE);

        Self {
            global: GovernorLimiter::direct(Quota::per_second(global_rps).allow_burst(burst)),
            per_target: GovernorLimiter::keyed(Quota::per_second(per_target_rps).allow_burst(burst)),
        }
    }

    /// Attempt to consume one global + one per-target token. Both must
    /// succeed; a per-target rejection does not consume the global token
    /// permanently (governor's check is side-effect-free on rejection).
    pub fn try_acquire(&self, target: &str) -> bool {
        if self.global.check().is_err() {
            return false;
        }
        self.per_target.check_key(&target.to_string()).is_ok()
    }
}

/// Shared handle, since the Dispatcher is invoked concurrently by every
/// Agent's fetch-tasks request.
pub type SharedRateLimiter = Arc<DispatchRateLimiter>;
