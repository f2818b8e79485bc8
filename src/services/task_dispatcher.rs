//! Task Dispatcher (spec component C6).
//!
//! Invoked synchronously on an Agent's fetch-tasks poll. Matches
//! `agent`-category pending tasks to the Agent's capabilities, applies rate
//! limits, and atomically claims.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Agent, AgentTask, Target, TaskCategory, TaskStatus};
use crate::domain::ports::{ClaimPredicate, TaskRepository};
use crate::services::policy_enforcer::{GlobalPolicy, PolicyEnforcer};
use crate::services::rate_limiter::DispatchRateLimiter;

/// Upper bound on how many tasks a single poll can claim, independent of
/// the Agent's own free-slot count.
const BATCH_CAP: usize = 25;

/// Outcome of a dispatch call: either a batch of tasks (possibly empty, if
/// none matched) or a `busy` signal telling the Agent to back off.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Tasks(Vec<AgentTask>),
    Busy,
}

pub struct TaskDispatcher {
    tasks: Arc<dyn TaskRepository>,
    rate_limiter: Arc<DispatchRateLimiter>,
    policy_enforcer: PolicyEnforcer,
}

impl TaskDispatcher {
    pub fn new(tasks: Arc<dyn TaskRepository>, rate_limiter: Arc<DispatchRateLimiter>) -> Self {
        Self { tasks, rate_limiter, policy_enforcer: PolicyEnforcer::new() }
    }

    /// Serve one fetch-tasks poll from `agent`, given how many tasks it
    /// currently holds in non-terminal state.
    #[tracing::instrument(skip(self, agent, global_policy))]
    pub async fn dispatch(
        &self,
        agent: &Agent,
        currently_assigned: u32,
        global_policy: &GlobalPolicy,
    ) -> CoreResult<DispatchOutcome> {
        let free_slots = agent.max_concurrent.saturating_sub(currently_assigned);
        if free_slots == 0 {
            return Ok(DispatchOutcome::Tasks(Vec::new()));
        }

        // Global token gates the poll itself, independent of target; an
        // arbitrary non-empty target name is fine for this check.
        if !self.rate_limiter.try_acquire("__global__") {
            return Ok(DispatchOutcome::Busy);
        }

        let limit = (free_slots as usize).min(BATCH_CAP);
        let predicate = ClaimPredicate::matching(agent.capabilities.clone(), HashSet::new());
        let claimed = self
            .tasks
            .claim_pending(TaskCategory::Agent, &predicate, &agent.id, limit)
            .await?;

        let mut surviving = Vec::with_capacity(claimed.len());
        for task in claimed {
            if !self.rate_limiter.try_acquire(&task.input_target) {
                // Per-target budget exhausted after the claim: back-pressure,
                // not a semantic failure, so release without touching
                // retry_count (spec §7) rather than going through retry_task.
                self.tasks.release_claim(task.id).await?;
                continue;
            }

            let target = Target::new(task.input_target.clone(), "dispatch");
            let decision = self.policy_enforcer.enforce(&target, global_policy);
            if decision.is_allow() {
                surviving.push(task);
            } else {
                tracing::info!(task_id = %task.id, "policy denied task at dispatch time");
                self.tasks
                    .record_result(
                        task.id,
                        TaskStatus::Failed,
                        None,
                        Some("denied by policy at dispatch".to_string()),
                    )
                    .await?;
            }
        }

        Ok(DispatchOutcome::Tasks(surviving))
    }
}
