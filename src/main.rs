//! Scanmaster binary entry point: loads config, wires the core, then either
//! runs the CLI's one-shot admin command or serves as the full daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use scanmaster::adapters::sqlite::{
    connection::{create_pool, PoolConfig},
    migrations::{all_embedded_migrations, Migrator},
    SqliteAgentRepository, SqliteProjectRepository, SqliteRuleRepository, SqliteTaskRepository,
    SqliteWorkflowRepository,
};
use scanmaster::application::http::{self, AppState};
use scanmaster::cli::{commands, Cli, Commands};
use scanmaster::domain::ports::{AgentRepository, NullTargetQueryProvider, ProjectRepository, TaskRepository};
use scanmaster::infrastructure::config::ConfigLoader;
use scanmaster::infrastructure::logging::LoggerImpl;
use scanmaster::services::{
    AgentRegistry, DispatchRateLimiter, GlobalPolicyDefaults, LocalAgent, ResultIngestor, RuleSnapshotBuilder,
    Scheduler, TargetResolver, TaskDispatcher,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path).context("failed to load configuration")?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };

    let _logger_guard = LoggerImpl::init(&config.logging).context("failed to initialize logging")?;

    let database_url = format!("sqlite:{}", config.database.path);
    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        ..PoolConfig::default()
    };
    let pool = create_pool(&database_url, Some(pool_config))
        .await
        .context("failed to connect to database")?;

    let migrator = Migrator::new(pool.clone());
    let applied = migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("failed to run database migrations")?;
    tracing::info!(migrations_applied = applied, "database ready");

    let projects: Arc<dyn ProjectRepository> = Arc::new(SqliteProjectRepository::new(pool.clone()));
    let workflows = Arc::new(SqliteWorkflowRepository::new(pool.clone()));
    let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let agents: Arc<dyn AgentRepository> = Arc::new(SqliteAgentRepository::new(pool.clone()));
    let _rules = Arc::new(SqliteRuleRepository::new(pool.clone()));

    let rate_limiter = Arc::new(DispatchRateLimiter::new(&config.rate_limit));
    let target_resolver = TargetResolver::new(Arc::new(NullTargetQueryProvider));
    let policy_defaults = GlobalPolicyDefaults::default();

    let agent_registry = Arc::new(AgentRegistry::new(agents.clone(), tasks.clone()));
    let dispatcher = Arc::new(TaskDispatcher::new(tasks.clone(), rate_limiter));
    let result_ingestor = Arc::new(ResultIngestor::new(tasks.clone()));
    let rule_snapshots = Arc::new(RuleSnapshotBuilder::new(config.rule_dir.clone(), config.rule_snapshot_secret.clone()));

    match cli.command {
        Commands::Serve => {
            let scheduler = Arc::new(Scheduler::new(
                projects.clone(),
                workflows,
                tasks.clone(),
                target_resolver,
                policy_defaults.clone(),
            ));
            let local_agent = Arc::new(LocalAgent::new(pool.clone(), tasks.clone()));

            tokio::spawn({
                let scheduler = scheduler.clone();
                let tick_secs = config.scheduler_tick_secs;
                async move {
                    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs));
                    loop {
                        interval.tick().await;
                        if let Err(e) = scheduler.tick().await {
                            tracing::error!(error = %e, "scheduler tick failed");
                        }
                    }
                }
            });

            tokio::spawn({
                let local_agent = local_agent.clone();
                let tick_secs = config.local_agent_tick_secs;
                async move {
                    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs));
                    loop {
                        interval.tick().await;
                        if let Err(e) = local_agent.tick().await {
                            tracing::error!(error = %e, "local agent tick failed");
                        }
                    }
                }
            });

            tokio::spawn({
                let agent_registry = agent_registry.clone();
                let heartbeat_secs = config.heartbeat_interval_secs;
                let offline_multiplier = config.heartbeat_offline_multiplier;
                async move {
                    let mut interval = tokio::time::interval(Duration::from_secs(heartbeat_secs));
                    loop {
                        interval.tick().await;
                        match agent_registry.sweep_stale(heartbeat_secs as i64, offline_multiplier as i64).await {
                            Ok(flipped) if flipped > 0 => tracing::info!(flipped, "stale agents marked offline"),
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = %e, "heartbeat sweep failed"),
                        }
                    }
                }
            });

            let state = AppState {
                agents: agent_registry,
                dispatcher,
                results: result_ingestor,
                tasks,
                rule_snapshots,
                policy_defaults: Arc::new(policy_defaults),
            };
            http::serve(state, &config.http.bind_addr).await
        }
        Commands::Project(args) => commands::project::handle(projects, args.command, cli.json).await,
        Commands::Task(args) => commands::task::handle(tasks, args.command, cli.json).await,
        Commands::Agent(args) => commands::agent::handle(agents, args.command, cli.json).await,
    }
}
