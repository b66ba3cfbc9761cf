pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "enginectl")]
#[command(about = "Operational CLI for the birthday/anniversary delivery engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run database migrations
    Migrate {
        /// Drop all tables and re-run every migration from scratch
        #[arg(long)]
        fresh: bool,
    },
    /// Seed demo users spread across the twelve timezones exercised by the test scenarios
    #[command(name = "db:seed")]
    DbSeed,
    /// Run the full service: schedulers, worker pool, and the operational HTTP surface
    Serve,
    /// Run one of the three schedulers once and exit
    #[command(subcommand)]
    Schedule(ScheduleCommands),
    /// Run a standalone worker pool against the main queue
    Worker {
        /// Number of concurrent consumers
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Inspect delivery-log and queue state
    #[command(subcommand)]
    Queue(QueueCommands),
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Run the daily pre-calculation pass once
    Precalc,
    /// Run the per-minute enqueue pass once
    Enqueue,
    /// Run the recovery pass once
    Recover,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Summarize delivery_logs by status
    Stats,
    /// List rows currently marked FAILED, most recent first
    Dlq {
        #[arg(long, default_value = "25")]
        limit: i64,
    },
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Migrate { fresh } => commands::migrate::handle_migrate(fresh),
        Commands::DbSeed => commands::seed::handle_seed(),
        Commands::Serve => commands::serve::handle_serve().await,
        Commands::Schedule(cmd) => commands::schedule::handle(cmd).await,
        Commands::Worker { concurrency } => commands::worker::handle(concurrency).await,
        Commands::Queue(cmd) => commands::queue::handle(cmd),
    }
}
