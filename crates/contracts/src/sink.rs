//! EventSink trait - delivery output interface
//!
//! Defines the abstract interface for sinks. Sinks receive shared references
//! because the delivery queue may hand different events to the same sink from
//! several workers at once.

use crate::{ContractError, Event};

/// Event delivery trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(EventSink: Send)]
pub trait LocalEventSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one finalized event
    ///
    /// # Errors
    /// Returns delivery error (should include context). Never panics on I/O failure.
    async fn deliver(&self, event: &Event) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&self) -> Result<(), ContractError>;
}
