//! Scheduler Engine.
//!
//! Main control loop: advances cron-triggered projects, walks each running
//! project's stage DAG materializing newly-eligible stages into tasks, and
//! reclaims tasks that have timed out. Runs as its own `tokio::spawn`ed loop,
//! talking to the Task Store and Project/Workflow repositories only — no
//! direct channel to the Dispatcher or Local Agent.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use cron::Schedule;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Project, ProjectStatus, ScanStage, TaskStatus};
use crate::domain::ports::{ProjectRepository, TaskRepository, WorkflowRepository};
use crate::services::policy_enforcer::{GlobalPolicy, PolicyEnforcer};
use crate::services::target_resolver::TargetResolver;
use crate::services::task_generator::TaskGenerator;

/// Operator-wide policy applied on top of each project's own scope
/// (its seed targets). Distinct per project only in `scope`.
#[derive(Debug, Clone, Default)]
pub struct GlobalPolicyDefaults {
    pub whitelist: Vec<String>,
    pub skip_rule: Option<crate::domain::models::Expr>,
}

pub struct Scheduler {
    projects: Arc<dyn ProjectRepository>,
    workflows: Arc<dyn WorkflowRepository>,
    tasks: Arc<dyn TaskRepository>,
    target_resolver: TargetResolver,
    policy_enforcer: PolicyEnforcer,
    task_generator: TaskGenerator,
    policy_defaults: GlobalPolicyDefaults,
}

/// Summary of one tick, for logging and tests.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub cron_triggered: u64,
    pub stages_materialized: u64,
    pub projects_finished: u64,
    pub projects_errored: u64,
    pub tasks_timed_out: u64,
}

impl Scheduler {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        workflows: Arc<dyn WorkflowRepository>,
        tasks: Arc<dyn TaskRepository>,
        target_resolver: TargetResolver,
        policy_defaults: GlobalPolicyDefaults,
    ) -> Self {
        Self {
            projects,
            workflows,
            tasks,
            target_resolver,
            policy_enforcer: PolicyEnforcer::new(),
            task_generator: TaskGenerator::new(),
            policy_defaults,
        }
    }

    /// One scheduler tick. Each step is independent: one project's failure
    /// never aborts the rest of the tick.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> CoreResult<TickReport> {
        let mut report = TickReport::default();

        self.cron_check(&mut report).await?;
        self.sweep_running_projects(&mut report).await?;
        self.timeout_sweep(&mut report).await?;

        Ok(report)
    }

    async fn cron_check(&self, report: &mut TickReport) -> CoreResult<()> {
        let now = chrono::Utc::now();
        for mut project in self.projects.list_due(now).await? {
            if project.is_advancing() {
                continue;
            }
            let Some(expr) = &project.cron_expression else { continue };
            let Ok(schedule) = Schedule::from_str(expr) else {
                tracing::warn!(project_id = %project.id, "unparseable cron expression, skipping");
                continue;
            };
            let due = project
                .last_run_at
                .map_or(true, |last| schedule.after(&last).next().is_some_and(|next| next <= now));
            if !due {
                continue;
            }

            project.status = ProjectStatus::Running;
            project.last_run_at = Some(now);
            project.version += 1;
            project.updated_at = now;
            self.projects.update(&project).await?;
            report.cron_triggered += 1;
            tracing::info!(project_id = %project.id, "cron-triggered project to running");
        }
        Ok(())
    }

    async fn sweep_running_projects(&self, report: &mut TickReport) -> CoreResult<()> {
        for project in self.projects.list_running().await? {
            if let Err(e) = self.advance_project(&project, report).await {
                tracing::error!(project_id = %project.id, error = %e, "stage advancement failed for project");
            }
        }
        Ok(())
    }

    async fn advance_project(&self, project: &Project, report: &mut TickReport) -> CoreResult<()> {
        let links = self.workflows.list_for_project(project.id).await?;
        let mut all_stages: Vec<ScanStage> = Vec::new();
        for link in &links {
            let stages = self.workflows.list_stages(link.workflow_id).await?;
            // Defense in depth: acyclicity is already enforced at stage
            // create/update time, but a corrupted or externally seeded
            // workflow should still fail a running project rather than loop
            // forever trying to find a materializable stage.
            if crate::domain::models::validate_acyclic(&stages).is_err() {
                tracing::error!(project_id = %project.id, workflow_id = %link.workflow_id, "cyclic workflow detected at scheduling time");
                self.mark_error(project).await?;
                report.projects_errored += 1;
                return Ok(());
            }
            all_stages.extend(stages);
        }
        if all_stages.is_empty() {
            return Ok(());
        }

        let mut stage_tasks = Vec::with_capacity(all_stages.len());
        for stage in &all_stages {
            stage_tasks.push(self.tasks.list_for_stage(stage.id).await?);
        }

        // a. unrecoverable failure check
        for tasks in &stage_tasks {
            let hit_dead_end = tasks
                .iter()
                .any(|t| t.status == TaskStatus::Failed && !t.can_retry());
            if hit_dead_end {
                self.mark_error(project).await?;
                report.projects_errored += 1;
                return Ok(());
            }
        }

        let completed_stage_ids: HashSet<Uuid> = all_stages
            .iter()
            .zip(&stage_tasks)
            .filter(|(_, tasks)| !tasks.is_empty() && tasks.iter().all(|t| t.status == TaskStatus::Completed))
            .map(|(stage, _)| stage.id)
            .collect();

        let global_policy = GlobalPolicy {
            scope: project.seed_targets.clone(),
            whitelist: self.policy_defaults.whitelist.clone(),
            skip_rule: self.policy_defaults.skip_rule.clone(),
        };

        let mut any_unmaterialized = false;
        let mut materialized_this_tick = false;
        for (stage, tasks) in all_stages.iter().zip(&stage_tasks) {
            if !tasks.is_empty() {
                continue; // already materialized once; never re-materialize.
            }
            let predecessors_done = stage.predecessors.iter().all(|p| completed_stage_ids.contains(p));
            if !predecessors_done {
                any_unmaterialized = true;
                continue;
            }
            self.materialize_stage(project, stage, &global_policy).await?;
            report.stages_materialized += 1;
            materialized_this_tick = true;
        }

        // A stage materialized just now has freshly-Pending tasks that this
        // tick's `stage_tasks` snapshot (taken before materialization) does
        // not reflect; never declare the project finished on the same tick
        // it generated new work.
        let all_terminal = stage_tasks
            .iter()
            .all(|tasks| tasks.iter().all(|t| t.status.is_terminal()));
        if !any_unmaterialized && !materialized_this_tick && all_terminal && !stage_tasks.is_empty() {
            self.mark_finished(project).await?;
            report.projects_finished += 1;
        }

        Ok(())
    }

    async fn materialize_stage(
        &self,
        project: &Project,
        stage: &ScanStage,
        global_policy: &GlobalPolicy,
    ) -> CoreResult<()> {
        let targets = self.target_resolver.resolve(&stage.target_policy, &project.seed_targets).await?;
        let tasks = self.task_generator.generate(project.id, stage, &targets);

        let mut surviving = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            let target = crate::domain::models::Target::new(
                task.input_target.split(',').next().unwrap_or_default(),
                "generation",
            );
            let decision = self.policy_enforcer.enforce(&target, global_policy);
            if decision.is_allow() {
                surviving.push(task);
            } else {
                task.status = TaskStatus::Failed;
                task.error_message = Some(match decision {
                    crate::services::policy_enforcer::PolicyDecision::Deny(reason) => reason,
                    crate::services::policy_enforcer::PolicyDecision::Allow => unreachable!(),
                });
                task.ended_at = Some(chrono::Utc::now());
                surviving.push(task);
            }
        }

        self.tasks.create_batch(&surviving).await
    }

    async fn mark_error(&self, project: &Project) -> CoreResult<()> {
        let mut updated = project.clone();
        updated.status = ProjectStatus::Error;
        updated.version += 1;
        updated.updated_at = chrono::Utc::now();
        self.projects.update(&updated).await
    }

    async fn mark_finished(&self, project: &Project) -> CoreResult<()> {
        let mut updated = project.clone();
        updated.status = ProjectStatus::Finished;
        updated.version += 1;
        updated.updated_at = chrono::Utc::now();
        self.projects.update(&updated).await
    }

    async fn timeout_sweep(&self, report: &mut TickReport) -> CoreResult<()> {
        let now = chrono::Utc::now();
        for task in self.tasks.list_overdue(now).await? {
            tracing::warn!(task_id = %task.id, "task exceeded timeout, re-queuing via retry path");
            self.tasks.retry_task(task.id).await?;
            report.tasks_timed_out += 1;
        }
        Ok(())
    }
}
