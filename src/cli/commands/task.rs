//! `scanmaster task list|show`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{list_table, print, CommandOutput};
use crate::domain::models::{AgentTask, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks, optionally filtered by project and/or status.
    List {
        #[arg(long)]
        project: Option<Uuid>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one task's full detail.
    Show { id: Uuid },
}

#[derive(Debug, Serialize)]
struct TaskListOutput(Vec<AgentTask>);

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "category", "tool", "target", "status", "agent", "retries"]);
        for t in &self.0 {
            table.add_row(vec![
                t.id.to_string(),
                t.category.as_str().to_string(),
                t.tool_name.clone(),
                t.input_target.clone(),
                t.status.as_str().to_string(),
                t.assigned_agent_id.clone().unwrap_or_else(|| "-".to_string()),
                format!("{}/{}", t.retry_count, t.max_retries),
            ]);
        }
        table.to_string()
    }
}

#[derive(Debug, Serialize)]
struct TaskShowOutput(AgentTask);

impl CommandOutput for TaskShowOutput {
    fn to_human(&self) -> String {
        let t = &self.0;
        format!(
            "id:          {}\nproject:     {}\nworkflow:    {}\nstage:       {}\ncategory:    {}\ntool:        {}\ntarget:      {}\nstatus:      {}\nagent:       {}\nretries:     {}/{}\ntimeout(s):  {}\ncreated:     {}\nended:       {}\nerror:       {}",
            t.id,
            t.project_id,
            t.workflow_id,
            t.stage_id,
            t.category.as_str(),
            t.tool_name,
            t.input_target,
            t.status.as_str(),
            t.assigned_agent_id.as_deref().unwrap_or("-"),
            t.retry_count,
            t.max_retries,
            t.timeout_seconds,
            t.created_at.to_rfc3339(),
            t.ended_at.map_or_else(|| "-".to_string(), |e| e.to_rfc3339()),
            t.error_message.as_deref().unwrap_or("-"),
        )
    }
}

pub async fn handle(tasks: Arc<dyn TaskRepository>, command: TaskCommands, json: bool) -> Result<()> {
    match command {
        TaskCommands::List { project, status } => {
            let filter = TaskFilter {
                project_id: project,
                status: status.as_deref().and_then(TaskStatus::from_str),
                ..Default::default()
            };
            let found = tasks.list(filter).await.context("failed to list tasks")?;
            print(&TaskListOutput(found), json);
        }
        TaskCommands::Show { id } => {
            let task = tasks
                .get(id)
                .await
                .context("failed to load task")?
                .ok_or_else(|| anyhow::anyhow!("no task with id {id}"))?;
            print(&TaskShowOutput(task), json);
        }
    }
    Ok(())
}
