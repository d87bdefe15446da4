//! Runtime configuration contracts shared across crates.
//!
//! Every section has serde defaults, so an empty document yields the
//! default service: 10 000-entry queue, 5 concurrent deliveries, 3 retries
//! from 1 s, 100 KiB event ceiling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Top-level telemetry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TelemetryConfig {
    /// Queue and dispatch settings
    #[serde(default)]
    #[validate(nested)]
    pub delivery: DeliveryConfig,

    /// Size and shape limits for finalized events
    #[serde(default)]
    #[validate(nested)]
    pub limits: LimitsConfig,

    /// Sink list
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// Delivery queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Maximum queued (not yet dispatched) events
    #[validate(range(min = 1))]
    pub max_queue_size: usize,

    /// Maximum concurrent deliveries (worker pool size)
    #[validate(range(min = 1, max = 1024))]
    pub max_concurrency: usize,

    /// Retry policy for primary sinks
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Default shutdown drain timeout in milliseconds
    pub shutdown_timeout_ms: u64,

    /// Shutdown drain polling interval in milliseconds
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
}

impl DeliveryConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10_000,
            max_concurrency: 5,
            retry: RetryConfig::default(),
            shutdown_timeout_ms: 5_000,
            poll_interval_ms: 100,
        }
    }
}

/// Exponential backoff policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[validate(range(max = 16))]
    pub max_retries: u32,

    /// Delay before the first retry; doubles for each following retry
    pub base_delay_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based): base, 2×base, 4×base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
        }
    }
}

/// Size/shape limits applied by normalization and truncation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LimitsConfig {
    /// Hard ceiling on the serialized event, in UTF-8 bytes
    #[validate(range(min = 1024))]
    pub max_event_bytes: usize,

    /// Cap for any string inside a payload, in chars
    #[validate(range(min = 1))]
    pub max_string_length: usize,

    /// Container nesting limit for payloads
    pub max_depth: usize,

    /// Entries kept per container
    #[validate(range(min = 1))]
    pub max_breadth: usize,

    /// Stack frames kept (first half + last half)
    #[validate(range(min = 2))]
    pub max_stack_frames: usize,

    /// Cap for free-text fields (user intent, error message), in chars
    #[validate(range(min = 1))]
    pub max_text_length: usize,

    /// Cap for name/version/identifier fields, in chars
    #[validate(range(min = 1))]
    pub max_name_length: usize,

    /// Cap for large text blobs (error stack), in chars
    #[validate(range(min = 1))]
    pub max_blob_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_event_bytes: 102_400,
            max_string_length: 32_768,
            max_depth: 10,
            max_breadth: 1_000,
            max_stack_frames: 50,
            max_text_length: 2_048,
            max_name_length: 256,
            max_blob_length: 32_768,
        }
    }
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Delivery role, selects the retry policy
    #[serde(default)]
    pub role: SinkRole,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Structured log output
    Log,
    /// JSON Lines file
    File,
    /// UDP JSON datagrams
    Network,
}

/// Delivery role of a sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkRole {
    /// Primary analytics sink: retried with exponential backoff
    #[default]
    Primary,
    /// Fire-and-forget exporter: single attempt, failure logged
    Auxiliary,
}
