//! # Telemetry Relay CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration loading and validation
//! - Replay of recorded events through the delivery queue
//! - Graceful shutdown handling

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_replay, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(ObservabilityConfig {
        default_log_level: cli.default_log_level().to_string(),
        ..ObservabilityConfig::logs_only(cli.log_format.into())
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry Relay CLI starting"
    );

    let result = match &cli.command {
        Commands::Replay(args) => run_replay(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
