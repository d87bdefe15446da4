//! Delivery metrics
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

const ENQUEUED: &str = "telemetry_relay_events_enqueued_total";
const EVICTED: &str = "telemetry_relay_events_evicted_total";
const REJECTED: &str = "telemetry_relay_events_rejected_total";
const DISCARDED: &str = "telemetry_relay_events_discarded_total";
const REDACTION_FAILURES: &str = "telemetry_relay_redaction_failures_total";
const DELIVERIES: &str = "telemetry_relay_deliveries_total";
const EVENT_BYTES: &str = "telemetry_relay_event_bytes";

/// Register help text for every relay metric
pub fn describe_metrics() {
    describe_counter!(ENQUEUED, "Events accepted into the delivery queue");
    describe_counter!(EVICTED, "Oldest events evicted because the queue was full");
    describe_counter!(REJECTED, "Events dropped because shutdown had begun");
    describe_counter!(DISCARDED, "Queued events discarded by a timed-out shutdown");
    describe_counter!(REDACTION_FAILURES, "Events dropped because redaction failed");
    describe_counter!(DELIVERIES, "Sink delivery outcomes by sink and outcome");
    describe_histogram!(EVENT_BYTES, Unit::Bytes, "Serialized size of finalized events");
}

pub fn record_event_enqueued() {
    counter!(ENQUEUED).increment(1);
}

pub fn record_event_evicted() {
    counter!(EVICTED).increment(1);
}

pub fn record_event_rejected() {
    counter!(REJECTED).increment(1);
}

pub fn record_events_discarded(count: u64) {
    counter!(DISCARDED).increment(count);
}

pub fn record_redaction_failure() {
    counter!(REDACTION_FAILURES).increment(1);
}

/// Record one sink outcome: `delivered`, `retried` or `failed`
pub fn record_delivery(sink_name: &str, outcome: &'static str) {
    counter!(
        DELIVERIES,
        "sink" => sink_name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record the serialized size of a finalized event
pub fn record_event_bytes(bytes: usize) {
    histogram!(EVENT_BYTES).record(bytes as f64);
}
