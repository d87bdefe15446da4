//! Delivery counters for observability
//!
//! Atomics are the source of truth for in-process inspection; every
//! increment is mirrored to the global `metrics` recorder.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Events the sink accepted
    delivered: AtomicU64,
    /// Events dropped for this sink after the last attempt failed
    failed: AtomicU64,
    /// Retry attempts scheduled
    retried: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self, sink: &str) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_delivery(sink, "delivered");
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self, sink: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_delivery(sink, "failed");
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn inc_retried(&self, sink: &str) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_delivery(sink, "retried");
    }

    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            delivered: self.delivered(),
            failed: self.failed(),
            retried: self.retried(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkMetricsSnapshot {
    pub delivered: u64,
    pub failed: u64,
    pub retried: u64,
}

impl fmt::Display for SinkMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivered={}, failed={}, retried={}",
            self.delivered, self.failed, self.retried
        )
    }
}

/// Queue-level counters
#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    evicted: AtomicU64,
    rejected: AtomicU64,
    redaction_failed: AtomicU64,
    finalized: AtomicU64,
    discarded: AtomicU64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_event_enqueued();
    }

    /// Oldest entry dropped to make room
    pub fn inc_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_event_evicted();
    }

    /// Enqueue after shutdown began
    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_event_rejected();
    }

    pub fn inc_redaction_failed(&self) {
        self.redaction_failed.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_redaction_failure();
    }

    pub fn inc_finalized(&self, bytes: usize) {
        self.finalized.fetch_add(1, Ordering::Relaxed);
        observability::metrics::record_event_bytes(bytes);
    }

    /// Entries left behind by a timed-out shutdown
    pub fn add_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
        observability::metrics::record_events_discarded(count);
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            redaction_failed: self.redaction_failed.load(Ordering::Relaxed),
            finalized: self.finalized.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`QueueMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    pub enqueued: u64,
    pub evicted: u64,
    pub rejected: u64,
    pub redaction_failed: u64,
    pub finalized: u64,
    pub discarded: u64,
}

impl fmt::Display for QueueMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Enqueued: {}", self.enqueued)?;
        writeln!(f, "Finalized: {}", self.finalized)?;
        writeln!(f, "Evicted (queue full): {}", self.evicted)?;
        writeln!(f, "Rejected (after shutdown): {}", self.rejected)?;
        writeln!(f, "Redaction failures: {}", self.redaction_failed)?;
        write!(f, "Discarded (shutdown timeout): {}", self.discarded)
    }
}
