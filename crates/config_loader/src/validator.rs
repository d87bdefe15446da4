//! Configuration validation
//!
//! Rules:
//! - field ranges declared on the config types (`validator` derive)
//! - sink names are unique
//! - each sink type has its required params (`path` for file, a parseable
//!   `addr` for network)
//! - per-field caps fit under the event byte ceiling
//! - the shutdown poll interval does not exceed the shutdown timeout

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, SinkType, TelemetryConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a parsed TelemetryConfig
///
/// Returns the first violation found, or Ok(()).
pub fn validate(config: &TelemetryConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_sink_names(config)?;
    validate_sink_params(config)?;
    validate_limits(config)?;
    validate_delivery(config)?;
    Ok(())
}

fn validate_ranges(config: &TelemetryConfig) -> Result<(), ContractError> {
    let Err(errors) = config.validate() else {
        return Ok(());
    };
    let mut violations = Vec::new();
    collect_violations(&errors, "", &mut violations);
    violations.sort();

    match violations.into_iter().next() {
        Some((field, message)) => Err(ContractError::config_validation(field, message)),
        None => Err(ContractError::config_validation("config", errors.to_string())),
    }
}

/// Flatten nested `validator` errors into `(dotted.path, message)` pairs
fn collect_violations(errors: &ValidationErrors, prefix: &str, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                for err in errs {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", err.code));
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_violations(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect_violations(inner, &format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}

fn validate_sink_names(config: &TelemetryConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sink in &config.sinks {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

fn validate_sink_params(config: &TelemetryConfig) -> Result<(), ContractError> {
    for sink in &config.sinks {
        match sink.sink_type {
            SinkType::Log => {}
            SinkType::File => {
                if sink.params.get("path").is_none_or(|p| p.is_empty()) {
                    return Err(ContractError::config_validation(
                        format!("sinks.{}.params.path", sink.name),
                        "file sink requires a 'path' parameter",
                    ));
                }
            }
            SinkType::Network => {
                let field = format!("sinks.{}.params.addr", sink.name);
                let addr = sink.params.get("addr").ok_or_else(|| {
                    ContractError::config_validation(
                        field.clone(),
                        "network sink requires an 'addr' parameter",
                    )
                })?;
                addr.parse::<SocketAddr>().map_err(|e| {
                    ContractError::config_validation(field, format!("invalid address '{addr}': {e}"))
                })?;
            }
        }
    }
    Ok(())
}

fn validate_limits(config: &TelemetryConfig) -> Result<(), ContractError> {
    let limits = &config.limits;
    let caps = [
        ("limits.max_text_length", limits.max_text_length),
        ("limits.max_name_length", limits.max_name_length),
    ];
    for (field, cap) in caps {
        if cap > limits.max_event_bytes {
            return Err(ContractError::config_validation(
                field,
                format!("{cap} exceeds max_event_bytes ({})", limits.max_event_bytes),
            ));
        }
    }
    Ok(())
}

fn validate_delivery(config: &TelemetryConfig) -> Result<(), ContractError> {
    let delivery = &config.delivery;
    if delivery.shutdown_timeout_ms > 0 && delivery.poll_interval_ms > delivery.shutdown_timeout_ms {
        return Err(ContractError::config_validation(
            "delivery.poll_interval_ms",
            format!(
                "poll interval ({} ms) exceeds shutdown timeout ({} ms)",
                delivery.poll_interval_ms, delivery.shutdown_timeout_ms
            ),
        ));
    }
    Ok(())
}
