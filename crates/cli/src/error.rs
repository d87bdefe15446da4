//! Error types for CLI operations.

use contracts::ContractError;
use dispatcher::DispatcherError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or failed validation
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ContractError),

    /// Delivery queue construction error
    #[error("Failed to start delivery: {0}")]
    Dispatcher(#[from] DispatcherError),

    /// A replay input line is not a valid event record
    #[error("Invalid event record at line {line}: {message}")]
    InvalidRecord { line: usize, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_record(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
