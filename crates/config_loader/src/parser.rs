//! Configuration parsing
//!
//! TOML is the primary format; JSON is accepted for generated configs.

use contracts::{ContractError, TelemetryConfig};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<TelemetryConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<TelemetryConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<TelemetryConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkRole, SinkType};

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[delivery]
max_queue_size = 500
max_concurrency = 8
shutdown_timeout_ms = 2000

[delivery.retry]
max_retries = 5
base_delay_ms = 250

[limits]
max_event_bytes = 65536
max_depth = 6

[[sinks]]
name = "analytics"
sink_type = "network"
[sinks.params]
addr = "127.0.0.1:9999"

[[sinks]]
name = "audit"
sink_type = "file"
role = "auxiliary"
[sinks.params]
path = "/var/log/relay/events.jsonl"
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.delivery.max_queue_size, 500);
        assert_eq!(config.delivery.retry.max_retries, 5);
        assert_eq!(config.delivery.poll_interval_ms, 100);
        assert_eq!(config.limits.max_event_bytes, 65_536);
        assert_eq!(config.limits.max_breadth, 1_000);
        assert_eq!(config.sinks.len(), 2);
        assert_eq!(config.sinks[0].sink_type, SinkType::Network);
        assert_eq!(config.sinks[0].role, SinkRole::Primary);
        assert_eq!(config.sinks[1].role, SinkRole::Auxiliary);
        assert_eq!(config.sinks[1].params["path"], "/var/log/relay/events.jsonl");
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "sinks": [{ "name": "log", "sink_type": "log" }] }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.sinks[0].name, "log");
        assert_eq!(config.delivery.max_concurrency, 5);
    }

    #[test]
    fn test_parse_empty_toml_is_default() {
        let config = parse_toml("").unwrap();
        assert!(config.sinks.is_empty());
        assert_eq!(config.limits.max_event_bytes, 102_400);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_sink_type_rejected() {
        let err = parse_toml("[[sinks]]\nname = \"x\"\nsink_type = \"kafka\"\n").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("JSON"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
