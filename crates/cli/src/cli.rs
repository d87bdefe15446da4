//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Telemetry Relay - redacts, bounds and delivers telemetry events to sinks
#[derive(Parser, Debug)]
#[command(
    name = "telemetry-relay",
    author,
    version,
    about = "Telemetry event relay",
    long_about = "Drives the telemetry delivery core from the command line.\n\n\
                  Replays recorded events through redaction, normalization and \n\
                  truncation, then delivers them to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TELEMETRY_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TELEMETRY_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Filter used when `RUST_LOG` is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON Lines file of recorded events through the delivery queue
    Replay(ReplayArgs),

    /// Validate configuration file without delivering anything
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "relay.toml",
        env = "TELEMETRY_RELAY_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON Lines file, one recorded event per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Literal text replaced by `[REDACTED]` in every payload string (repeatable)
    #[arg(long = "redact-literal", value_name = "TEXT")]
    pub redact_literals: Vec<String>,

    /// Override the configured shutdown drain timeout, in milliseconds
    #[arg(long, env = "TELEMETRY_RELAY_SHUTDOWN_TIMEOUT_MS")]
    pub shutdown_timeout_ms: Option<u64>,

    /// Serve Prometheus metrics on this address while replaying
    #[arg(long, env = "TELEMETRY_RELAY_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
