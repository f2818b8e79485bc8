//! `scanmaster project list|show`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{list_table, print, CommandOutput};
use crate::domain::models::Project;
use crate::domain::ports::{ProjectFilter, ProjectRepository};

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// List projects, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one project's full detail.
    Show { id: Uuid },
}

#[derive(Debug, Serialize)]
struct ProjectListOutput(Vec<Project>);

impl CommandOutput for ProjectListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "name", "status", "cron", "seed targets", "version"]);
        for p in &self.0 {
            table.add_row(vec![
                p.id.to_string(),
                p.name.clone(),
                p.status.as_str().to_string(),
                p.cron_expression.clone().unwrap_or_else(|| "-".to_string()),
                p.seed_targets.len().to_string(),
                p.version.to_string(),
            ]);
        }
        table.to_string()
    }
}

#[derive(Debug, Serialize)]
struct ProjectShowOutput(Project);

impl CommandOutput for ProjectShowOutput {
    fn to_human(&self) -> String {
        let p = &self.0;
        format!(
            "id:            {}\nname:          {}\nstatus:        {}\ncron:          {}\nlast run:      {}\nseed targets:  {}\nversion:       {}\ncreated:       {}\nupdated:       {}",
            p.id,
            p.name,
            p.status.as_str(),
            p.cron_expression.as_deref().unwrap_or("-"),
            p.last_run_at.map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
            p.seed_targets.join(", "),
            p.version,
            p.created_at.to_rfc3339(),
            p.updated_at.to_rfc3339(),
        )
    }
}

pub async fn handle(projects: Arc<dyn ProjectRepository>, command: ProjectCommands, json: bool) -> Result<()> {
    match command {
        ProjectCommands::List { status } => {
            let filter = ProjectFilter {
                status: status.as_deref().and_then(crate::domain::models::ProjectStatus::from_str),
                name_pattern: None,
            };
            let found = projects.list(filter).await.context("failed to list projects")?;
            print(&ProjectListOutput(found), json);
        }
        ProjectCommands::Show { id } => {
            let project = projects
                .get(id)
                .await
                .context("failed to load project")?
                .ok_or_else(|| anyhow::anyhow!("no project with id {id}"))?;
            print(&ProjectShowOutput(project), json);
        }
    }
    Ok(())
}
