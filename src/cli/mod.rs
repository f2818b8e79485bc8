//! Administrative CLI (`scanmaster project|task|agent|serve`). Convenience
//! for operators, not part of the Agent-facing wire protocol.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use commands::{agent::AgentArgs, project::ProjectArgs, task::TaskArgs};

#[derive(Parser, Debug)]
#[command(name = "scanmaster", version, about = "Master-side orchestrator for distributed vulnerability-scan fleets")]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a config file, overriding `scanmaster.yaml` in the working directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and manage scan projects.
    Project(ProjectArgs),
    /// Inspect agent tasks.
    Task(TaskArgs),
    /// Inspect registered Agents.
    Agent(AgentArgs),
    /// Run the orchestrator: scheduler, local agent, heartbeat sweeper, HTTP server.
    Serve,
}
