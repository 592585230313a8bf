//! CLI binary for famplan.
//!
//! `famplan run` speaks newline-delimited JSON on stdin/stdout; all tracing
//! output goes to stderr so stdout stays a clean protocol channel.

use clap::{Parser, Subcommand};
use famplan::channels::run_runtime;
use famplan::channels::stdio::StdioAdapter;
use famplan::messages;
use famplan::scheduler::SystemClock;
use famplan::store::open_store;
use famplan::{Planner, PlannerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// famplan: family task planner with daily reminders.
#[derive(Parser)]
#[command(name = "famplan", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Serve chat messages over stdin/stdout (JSON lines).
    Run,

    /// Print all pending tasks.
    Tasks,

    /// Validate the configuration and print the effective values.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("famplan=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => PlannerConfig::from_file(path)?,
        None => PlannerConfig::load_or_default(&PlannerConfig::default_config_path())?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Tasks => list_tasks(&config),
        Command::CheckConfig => check_config(&config),
    }
}

async fn run(config: PlannerConfig) -> anyhow::Result<()> {
    let planner = Planner::from_config(&config, Arc::new(SystemClock))?;
    tracing::info!("famplan v{} starting", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; shutting down");
            ctrl_c_cancel.cancel();
        }
    });

    run_runtime(planner, Arc::new(StdioAdapter::stdio()), cancel).await?;
    tracing::info!("famplan shut down cleanly");
    Ok(())
}

fn list_tasks(config: &PlannerConfig) -> anyhow::Result<()> {
    config.validate()?;
    let store = open_store(&config.store)?;
    let pending = store.find_pending()?;
    if pending.is_empty() {
        println!("{}", messages::NO_PENDING_TASKS);
        return Ok(());
    }
    for task in &pending {
        println!("{}\n", messages::task_summary(task));
    }
    Ok(())
}

fn check_config(config: &PlannerConfig) -> anyhow::Result<()> {
    config.validate()?;
    print!("{}", toml::to_string_pretty(config)?);
    println!("# store file: {}", config.store.resolved_path().display());
    match config.scheduler.resolved_ledger_path() {
        Some(path) => println!("# run-key ledger: {}", path.display()),
        None => println!("# run-key ledger: in memory"),
    }
    Ok(())
}
