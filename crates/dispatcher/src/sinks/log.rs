//! LogSink - logs event summary via tracing

use contracts::{ContractError, Event, EventSink};
use tracing::{info, instrument};

/// Sink that logs event summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_event_summary(&self, event: &Event) {
        info!(
            sink = %self.name,
            event_id = %event.id,
            session_id = %event.session_id,
            event_type = %event.event_type,
            resource = event.resource_name.as_deref().unwrap_or("-"),
            duration_ms = event.duration_ms,
            is_error = event.is_error,
            "Event received"
        );
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_deliver",
        skip(self, event),
        fields(sink = %self.name, event_id = %event.id)
    )]
    async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
        self.log_event_summary(event);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
