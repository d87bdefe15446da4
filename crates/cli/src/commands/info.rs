//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::TelemetryConfig;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    delivery: DeliveryInfo,
    limits: LimitsInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct DeliveryInfo {
    max_queue_size: usize,
    max_concurrency: usize,
    max_retries: u32,
    base_delay_ms: u64,
    shutdown_timeout_ms: u64,
}

#[derive(Serialize)]
struct LimitsInfo {
    max_event_bytes: usize,
    max_string_length: usize,
    max_depth: usize,
    max_breadth: usize,
    max_stack_frames: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    role: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let info = build_config_info(&config, args.sinks);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &TelemetryConfig, with_params: bool) -> ConfigInfo {
    let delivery = &config.delivery;
    let limits = &config.limits;

    let sinks = config
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: format!("{:?}", s.sink_type),
            role: format!("{:?}", s.role),
            params: if with_params {
                s.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    ConfigInfo {
        delivery: DeliveryInfo {
            max_queue_size: delivery.max_queue_size,
            max_concurrency: delivery.max_concurrency,
            max_retries: delivery.retry.max_retries,
            base_delay_ms: delivery.retry.base_delay_ms,
            shutdown_timeout_ms: delivery.shutdown_timeout_ms,
        },
        limits: LimitsInfo {
            max_event_bytes: limits.max_event_bytes,
            max_string_length: limits.max_string_length,
            max_depth: limits.max_depth,
            max_breadth: limits.max_breadth,
            max_stack_frames: limits.max_stack_frames,
        },
        sinks,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Telemetry Relay Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let delivery = &info.delivery;
    println!("📬 Delivery");
    println!("   ├─ Queue capacity: {}", delivery.max_queue_size);
    println!("   ├─ Concurrency: {}", delivery.max_concurrency);
    println!(
        "   ├─ Retries: {} (from {} ms, doubling)",
        delivery.max_retries, delivery.base_delay_ms
    );
    println!("   └─ Shutdown timeout: {} ms", delivery.shutdown_timeout_ms);

    let limits = &info.limits;
    println!("\n📏 Limits");
    println!("   ├─ Event ceiling: {} bytes", limits.max_event_bytes);
    println!("   ├─ String length: {}", limits.max_string_length);
    println!("   ├─ Depth: {}", limits.max_depth);
    println!("   ├─ Breadth: {}", limits.max_breadth);
    println!("   └─ Stack frames: {}", limits.max_stack_frames);

    println!("\n📤 Sinks ({})", info.sinks.len());
    for (i, sink) in info.sinks.iter().enumerate() {
        let is_last = i == info.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        println!("   {} {} ({}, {})", prefix, sink.name, sink.sink_type, sink.role);
        for (key, value) in &sink.params {
            println!("   {}   {} = {}", child_prefix, key, value);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkRole, SinkType};
    use std::collections::HashMap;

    fn config() -> TelemetryConfig {
        TelemetryConfig {
            sinks: vec![SinkConfig {
                name: "audit".into(),
                sink_type: SinkType::File,
                role: SinkRole::Primary,
                params: HashMap::from([("path".to_string(), "/tmp/a.jsonl".to_string())]),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_params_hidden_by_default() {
        let info = build_config_info(&config(), false);
        assert!(info.sinks[0].params.is_empty());
        assert_eq!(info.sinks[0].sink_type, "File");
        assert_eq!(info.delivery.max_retries, 3);

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["sinks"][0].get("params").is_none());
    }

    #[test]
    fn test_params_shown_on_request() {
        let info = build_config_info(&config(), true);
        assert_eq!(info.sinks[0].params["path"], "/tmp/a.jsonl");
        assert_eq!(info.sinks[0].role, "Primary");
    }
}
