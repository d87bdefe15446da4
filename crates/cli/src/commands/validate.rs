//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{SinkRole, TelemetryConfig};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    max_queue_size: usize,
    max_concurrency: usize,
    max_event_bytes: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_config(&args.config) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                max_queue_size: config.delivery.max_queue_size,
                max_concurrency: config.delivery.max_concurrency,
                max_event_bytes: config.limits.max_event_bytes,
                sink_count: config.sinks.len(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(config: &TelemetryConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - finalized events will be dropped".to_string());
    } else if config.sinks.iter().all(|s| s.role == SinkRole::Auxiliary) {
        warnings.push("No primary sink configured - failed deliveries are never retried".to_string());
    }

    if config.delivery.retry.max_retries > 0 && config.delivery.retry.base_delay_ms == 0 {
        warnings.push("delivery.retry.base_delay_ms is 0 - retries fire back to back".to_string());
    }

    if config.delivery.shutdown_timeout_ms == 0 {
        warnings.push("delivery.shutdown_timeout_ms is 0 - shutdown discards the backlog".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Queue capacity: {}", summary.max_queue_size);
            println!("  Concurrency: {}", summary.max_concurrency);
            println!("  Event ceiling: {} bytes", summary.max_event_bytes);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};
    use std::path::PathBuf;

    #[test]
    fn test_warnings_for_empty_and_auxiliary_only() {
        let mut config = TelemetryConfig::default();
        config.delivery.shutdown_timeout_ms = 0;
        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("No sinks"));

        config.delivery.shutdown_timeout_ms = 5_000;
        config.sinks.push(SinkConfig {
            name: "console".into(),
            sink_type: SinkType::Log,
            role: SinkRole::Auxiliary,
            params: Default::default(),
        });
        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("No primary sink"));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let args = ValidateArgs {
            config: PathBuf::from("/nonexistent/relay.toml"),
            json: true,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[[sinks]]\nname = \"log\"\nsink_type = \"log\"\n").unwrap();

        let result = validate_config(&ValidateArgs { config: path, json: false });
        assert!(result.valid);
        assert!(result.warnings.is_empty());
        assert_eq!(result.summary.unwrap().sink_count, 1);
    }
}
