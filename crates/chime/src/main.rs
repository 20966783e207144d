//! Chime: cron-driven job scheduling daemon.
//!
//! Subcommands:
//! - `daemon`: reconcile against the job table, then run the fire clock
//!   until interrupted

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod daemon;

#[derive(Parser)]
#[command(name = "chime")]
#[command(about = "Cron-driven job scheduling daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduling daemon
    Daemon {
        /// Cron expression for the built-in heartbeat job; omit to start
        /// with an empty schedule
        #[arg(long, env = "CHIME_HEARTBEAT_CRON")]
        heartbeat_cron: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chime=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { heartbeat_cron } => daemon::run(heartbeat_cron).await,
    }
}
