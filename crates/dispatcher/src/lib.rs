//! # Dispatcher
//!
//! Event delivery.
//!
//! Responsibilities:
//! - Buffer producer events in a bounded, drop-oldest queue
//! - Finalize and fan events out to sinks from a fixed worker pool
//! - Retry primary sinks with backoff, isolate each sink's failures
//! - Drain gracefully on shutdown

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod queue;
pub mod sinks;

pub use contracts::{Event, EventSink, RawEvent};
pub use dispatcher::{create_delivery_queue, create_sink_handle};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{QueueMetrics, QueueMetricsSnapshot, SinkMetrics, SinkMetricsSnapshot};
pub use queue::{DeliveryQueue, DeliveryQueueBuilder, QueueStats, ShutdownReport};
pub use sinks::{FileSink, FileSinkConfig, LogSink, NetworkSink, NetworkSinkConfig};
