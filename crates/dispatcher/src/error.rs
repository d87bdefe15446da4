//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
///
/// Only construction can fail. Once a queue is running, every failure ends
/// in a logged drop.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Queue built outside a Tokio runtime
    #[error("delivery queue must be built inside a tokio runtime: {0}")]
    NoRuntime(String),

    /// Invalid delivery configuration
    #[error("invalid delivery config: {0}")]
    InvalidConfig(String),

    /// Error from a contract type
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
