//! # Config Loader
//!
//! Loads the relay configuration.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate ranges and cross-field rules
//! - Produce a [`TelemetryConfig`]
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("relay.toml")).unwrap();
//! println!("sinks: {}", config.sinks.len());
//! ```

mod parser;
mod validator;

pub use contracts::TelemetryConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path
    ///
    /// The format is detected from the extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<TelemetryConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<TelemetryConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Validate an already-built configuration
    pub fn validate(config: &TelemetryConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    pub fn to_toml(config: &TelemetryConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &TelemetryConfig) -> Result<String, ContractError> {
        Ok(serde_json::to_string_pretty(config)?)
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkRole;
    use std::io::Write;

    const RELAY_TOML: &str = r#"
[delivery]
max_concurrency = 2
shutdown_timeout_ms = 1000

[delivery.retry]
max_retries = 2
base_delay_ms = 500

[limits]
max_event_bytes = 32768

[[sinks]]
name = "audit"
sink_type = "file"
[sinks.params]
path = "/tmp/relay/events.jsonl"

[[sinks]]
name = "console"
sink_type = "log"
role = "auxiliary"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let config = ConfigLoader::load_from_str(RELAY_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.delivery.max_concurrency, 2);
        assert_eq!(config.limits.max_event_bytes, 32_768);
        assert_eq!(config.sinks[1].role, SinkRole::Auxiliary);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(RELAY_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let reloaded = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.delivery.retry.base_delay_ms, 500);
        assert_eq!(reloaded.sinks.len(), 2);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(RELAY_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(reloaded.sinks[0].params["path"], "/tmp/relay/events.jsonl");
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[sinks]]
name = "log"
sink_type = "log"

[[sinks]]
name = "log"
sink_type = "log"
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(RELAY_TOML.as_bytes()).unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.sinks[0].name, "audit");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigLoader::load_from_path(Path::new("relay.yaml")).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }
}
