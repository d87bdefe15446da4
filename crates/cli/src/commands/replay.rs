//! `replay` command implementation.
//!
//! Reads recorded events from a JSON Lines file, pushes them through the
//! delivery queue and drains it.

use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use contracts::{ErrorPayload, RawEvent, RedactFn, Value};
use dispatcher::{create_delivery_queue, DeliveryQueue, ShutdownReport};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::load_config;
use crate::cli::ReplayArgs;
use crate::error::CliError;

const REDACTED: &str = "[REDACTED]";

/// One recorded event line
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayRecord {
    #[serde(default)]
    id: Option<String>,
    session_id: String,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "duration")]
    duration_ms: Option<u64>,
    event_type: String,
    #[serde(default)]
    resource_name: Option<String>,
    #[serde(default)]
    parameters: Option<serde_json::Value>,
    #[serde(default)]
    response: Option<serde_json::Value>,
    #[serde(default)]
    user_intent: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    error: Option<ErrorPayload>,
    #[serde(default)]
    actor_id: Option<String>,
    #[serde(default)]
    actor_name: Option<String>,
    #[serde(default)]
    actor_data: Option<serde_json::Value>,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    client_version: Option<String>,
    #[serde(default)]
    server_name: Option<String>,
    #[serde(default)]
    server_version: Option<String>,
}

impl ReplayRecord {
    fn into_raw(self, redaction: Option<&RedactFn>) -> RawEvent {
        let mut raw = RawEvent::new(self.session_id, self.event_type);
        raw.id = self.id;
        raw.project_id = self.project_id;
        if let Some(timestamp) = self.timestamp {
            raw.timestamp = timestamp;
        }
        raw.duration_ms = self.duration_ms;
        raw.resource_name = self.resource_name;
        raw.parameters = self.parameters.map(Value::from);
        raw.response = self.response.map(Value::from);
        raw.user_intent = self.user_intent;
        raw.is_error = self.is_error || self.error.is_some();
        raw.error = self.error;
        raw.actor_id = self.actor_id;
        raw.actor_name = self.actor_name;
        raw.actor_data = self.actor_data.map(Value::from);
        raw.client_name = self.client_name;
        raw.client_version = self.client_version;
        raw.server_name = self.server_name;
        raw.server_version = self.server_version;
        raw.redaction = redaction.cloned();
        raw
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ReplayCounts {
    replayed: usize,
    skipped: usize,
}

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let mut config = load_config(&args.config)?;
    if let Some(timeout_ms) = args.shutdown_timeout_ms {
        info!(timeout_ms, "Overriding shutdown timeout from CLI");
        config.delivery.shutdown_timeout_ms = timeout_ms;
    }

    if let Some(addr) = args.metrics_addr {
        observability::init_metrics_only(addr)?;
    }

    let queue = create_delivery_queue(&config)
        .await
        .map_err(CliError::from)
        .context("Failed to create delivery queue")?;

    let redaction = literal_redactor(&args.redact_literals);
    let counts = enqueue_file(&queue, &args.input, redaction.as_ref())
        .await
        .with_context(|| format!("Failed to replay {}", args.input.display()))?;

    let report = tokio::select! {
        report = queue.shutdown(config.delivery.shutdown_timeout()) => report,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, abandoning drain");
            queue.shutdown(Duration::ZERO).await
        }
    };

    print_summary(&queue, counts, &report);
    info!("Replay finished");
    Ok(())
}

/// Enqueue every record in `path`
///
/// Waits while the queue is at capacity so a file larger than the queue is
/// not evicted by its own tail.
async fn enqueue_file(
    queue: &DeliveryQueue,
    path: &Path,
    redaction: Option<&RedactFn>,
) -> Result<ReplayCounts, CliError> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let capacity = queue.config().max_queue_size;
    let poll_interval = queue.config().poll_interval();

    let mut counts = ReplayCounts::default();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = match parse_record(line_no, &line) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Skipping record");
                counts.skipped += 1;
                continue;
            }
        };

        while queue.stats().queue_length >= capacity {
            tokio::time::sleep(poll_interval).await;
        }
        queue.enqueue(record.into_raw(redaction));
        counts.replayed += 1;
    }

    info!(
        replayed = counts.replayed,
        skipped = counts.skipped,
        "Input file enqueued"
    );
    Ok(counts)
}

fn parse_record(line_no: usize, line: &str) -> Result<ReplayRecord, CliError> {
    serde_json::from_str(line).map_err(|e| CliError::invalid_record(line_no, e.to_string()))
}

/// Redaction that masks each literal wherever it occurs
fn literal_redactor(literals: &[String]) -> Option<RedactFn> {
    let literals: Vec<String> = literals.iter().filter(|l| !l.is_empty()).cloned().collect();
    if literals.is_empty() {
        return None;
    }
    Some(RedactFn::new(move |text: &str| {
        Ok::<_, Infallible>(
            literals
                .iter()
                .fold(text.to_string(), |acc, literal| acc.replace(literal.as_str(), REDACTED)),
        )
    }))
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_summary(queue: &DeliveryQueue, counts: ReplayCounts, report: &ShutdownReport) {
    println!("\n=== Replay Summary ===\n");
    println!("Records replayed: {}", counts.replayed);
    println!("Records skipped: {}", counts.skipped);
    println!(
        "Shutdown: {} in {:.2}s",
        if report.drained { "drained" } else { "timed out" },
        report.elapsed.as_secs_f64()
    );
    if report.timed_out() {
        println!("  Discarded: {}", report.discarded);
        println!("  Abandoned in flight: {}", report.abandoned_active);
    }

    println!("\nQueue:");
    for line in queue.metrics().to_string().lines() {
        println!("  {line}");
    }

    println!("\nSinks:");
    for (name, metrics) in queue.sink_metrics() {
        println!("  - {name}: {metrics}");
    }
    println!();
}
