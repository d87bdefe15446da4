//! # Observability
//!
//! Tracing and Prometheus metrics for the telemetry relay.
//!
//! ## Features
//!
//! - Tracing initialization (JSON / pretty / compact)
//! - Prometheus exporter
//! - `telemetry_relay_*` counters recorded by the delivery queue
//!
//! ## Example
//!
//! ```ignore
//! observability::init()?;
//!
//! observability::metrics::record_event_enqueued();
//! ```

pub mod metrics;

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    describe_metrics, record_delivery, record_event_bytes, record_event_enqueued,
    record_event_evicted, record_event_rejected, record_events_discarded,
    record_redaction_failure,
};

/// Default Prometheus listener
pub const DEFAULT_METRICS_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9000);

/// Initialize tracing and the Prometheus exporter with defaults
///
/// - Tracing: JSON, filtered by `RUST_LOG`
/// - Prometheus: listens on 0.0.0.0:9000
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus listener (None = disabled)
    pub metrics_addr: Option<SocketAddr>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_addr: Some(DEFAULT_METRICS_ADDR.into()),
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Logs only, no exporter
    pub fn logs_only(log_format: LogFormat) -> Self {
        Self {
            log_format,
            metrics_addr: None,
            ..Default::default()
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    /// Human readable, multi-line
    Pretty,
    /// Single line
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}' (json, pretty, compact)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => tracing_fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => tracing_fmt::layer().pretty().boxed(),
        LogFormat::Compact => tracing_fmt::layer().compact().boxed(),
    }
}

/// Initialize with a custom configuration
///
/// # Errors
/// Fails when a global subscriber or recorder is already installed.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(addr) = config.metrics_addr {
        init_metrics_only(addr)?;
    }

    tracing::info!(
        log_format = %config.log_format,
        metrics_addr = ?config.metrics_addr,
        "Observability initialized"
    );

    Ok(())
}

/// Install only the Prometheus exporter
///
/// For hosts that already own the tracing subscriber.
pub fn init_metrics_only(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus recorder")?;
    describe_metrics();

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}
