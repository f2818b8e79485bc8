//! `scanmaster agent list`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{list_table, print, CommandOutput};
use crate::domain::models::Agent;
use crate::domain::ports::{AgentFilter, AgentRepository};

#[derive(Args, Debug)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommands,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// List registered Agents, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct AgentListOutput(Vec<Agent>);

impl CommandOutput for AgentListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "hostname", "address", "status", "capabilities", "last heartbeat"]);
        for a in &self.0 {
            let mut caps: Vec<&str> = a.capabilities.iter().map(String::as_str).collect();
            caps.sort_unstable();
            table.add_row(vec![
                a.id.clone(),
                a.hostname.clone(),
                format!("{}:{}", a.address, a.port),
                a.status.as_str().to_string(),
                caps.join(","),
                a.last_heartbeat.to_rfc3339(),
            ]);
        }
        table.to_string()
    }
}

pub async fn handle(agents: Arc<dyn AgentRepository>, command: AgentCommands, json: bool) -> Result<()> {
    match command {
        AgentCommands::List { status } => {
            let filter = AgentFilter {
                status: status.as_deref().and_then(crate::domain::models::AgentStatus::from_str),
                ..Default::default()
            };
            let found = agents.list(filter).await.context("failed to list agents")?;
            print(&AgentListOutput(found), json);
        }
    }
    Ok(())
}
