//! SinkHandle - a registered sink plus its delivery policy
//!
//! The role picks the policy: primary sinks retry with exponential backoff,
//! auxiliary sinks get a single attempt. Either way the outcome stays local
//! to the sink; it never reaches other sinks or the producer. A sink that
//! panics is treated as a failed attempt.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, Event, EventSink, RetryConfig, SinkRole};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::metrics::SinkMetrics;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Object-safe view of an [`EventSink`]
trait ErasedSink: Send + Sync {
    fn sink_name(&self) -> &str;
    fn deliver_boxed<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, Result<(), ContractError>>;
    fn flush_boxed(&self) -> BoxFuture<'_, Result<(), ContractError>>;
    fn close_boxed(&self) -> BoxFuture<'_, Result<(), ContractError>>;
}

impl<S> ErasedSink for S
where
    S: EventSink + Sync + 'static,
{
    fn sink_name(&self) -> &str {
        self.name()
    }

    fn deliver_boxed<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, Result<(), ContractError>> {
        self.deliver(event).boxed()
    }

    fn flush_boxed(&self) -> BoxFuture<'_, Result<(), ContractError>> {
        self.flush().boxed()
    }

    fn close_boxed(&self) -> BoxFuture<'_, Result<(), ContractError>> {
        self.close().boxed()
    }
}

/// Handle to a registered sink
#[derive(Clone)]
pub struct SinkHandle {
    name: String,
    role: SinkRole,
    retry: RetryConfig,
    sink: Arc<dyn ErasedSink>,
    metrics: Arc<SinkMetrics>,
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHandle")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl SinkHandle {
    /// Wrap a sink with the given role and retry policy
    pub fn new<S>(sink: S, role: SinkRole, retry: RetryConfig) -> Self
    where
        S: EventSink + Sync + 'static,
    {
        let sink: Arc<dyn ErasedSink> = Arc::new(sink);
        Self {
            name: sink.sink_name().to_string(),
            role,
            retry,
            sink,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> SinkRole {
        self.role
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Deliver `event` according to this sink's policy
    ///
    /// Returns whether the sink eventually accepted the event.
    #[instrument(
        name = "sink_handle_deliver",
        skip(self, event),
        fields(sink = %self.name, event_id = %event.id)
    )]
    pub async fn deliver(&self, event: &Event) -> bool {
        let max_retries = match self.role {
            SinkRole::Primary => self.retry.max_retries,
            SinkRole::Auxiliary => 0,
        };

        let mut retries = 0;
        loop {
            match self.guarded("deliver", self.sink.deliver_boxed(event)).await {
                Ok(()) => {
                    self.metrics.inc_delivered(&self.name);
                    if retries > 0 {
                        debug!(sink = %self.name, retries, "Delivered after retry");
                    }
                    return true;
                }
                Err(e) if retries < max_retries => {
                    retries += 1;
                    let delay = self.retry.delay_for(retries).min(MAX_BACKOFF);
                    self.metrics.inc_retried(&self.name);
                    warn!(
                        sink = %self.name,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Delivery failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    self.metrics.inc_failed(&self.name);
                    error!(
                        sink = %self.name,
                        role = ?self.role,
                        attempts = retries + 1,
                        error = %e,
                        "Delivery failed, event dropped for sink"
                    );
                    return false;
                }
            }
        }
    }

    /// Flush without closing
    pub async fn flush(&self) {
        if let Err(e) = self.guarded("flush", self.sink.flush_boxed()).await {
            error!(sink = %self.name, error = %e, "Flush failed");
        }
    }

    /// Flush then close
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(&self) {
        self.flush().await;
        if let Err(e) = self.guarded("close", self.sink.close_boxed()).await {
            error!(sink = %self.name, error = %e, "Close failed on shutdown");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }

    /// Await a sink call, turning a panic into an error
    async fn guarded(
        &self,
        op: &'static str,
        call: BoxFuture<'_, Result<(), ContractError>>,
    ) -> Result<(), ContractError> {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(sink = %self.name, op, panic = %message, "Sink panicked");
                Err(ContractError::sink_write(
                    &self.name,
                    format!("panicked during {op}: {message}"),
                ))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
