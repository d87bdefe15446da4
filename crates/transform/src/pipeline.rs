//! EventPipeline - RawEvent to delivery-ready Event
//!
//! Stage order: sanitize, redact, normalize, assign id, truncate.
//!
//! Sanitizing first keeps binary blobs away from the redaction function and
//! leaves the redactor working on private copies of the payloads.

use contracts::{ContractError, Event, LimitsConfig, RawEvent, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::normalize::Normalizer;
use crate::redact::Redactor;
use crate::sanitize::Sanitizer;
use crate::truncate::Truncator;

/// Prefix of generated event ids
pub const EVENT_ID_PREFIX: &str = "evt_";

/// Generate a time-ordered event id
pub fn new_event_id() -> String {
    format!("{EVENT_ID_PREFIX}{}", Uuid::now_v7().simple())
}

/// Finalization stages bound to one set of limits
#[derive(Debug, Clone, Default)]
pub struct EventPipeline {
    sanitizer: Sanitizer,
    redactor: Redactor,
    normalizer: Normalizer,
    truncator: Truncator,
}

impl EventPipeline {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            sanitizer: Sanitizer::from_limits(limits),
            redactor: Redactor::default().with_limits(limits),
            normalizer: Normalizer::from_limits(limits),
            truncator: Truncator::new(limits.clone()),
        }
    }

    pub fn limits(&self) -> &LimitsConfig {
        self.truncator.limits()
    }

    /// Replace the protected-field allowlist
    ///
    /// The redactor is rebound to this pipeline's limits.
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor.with_limits(self.truncator.limits());
        self
    }

    /// Finalize `raw` into a size-bounded [`Event`]
    ///
    /// The redaction function is taken out of the event before it runs, so it
    /// is invoked at most once per event.
    ///
    /// # Errors
    /// Returns [`ContractError::Redaction`] when the redaction function fails;
    /// the event must then be dropped.
    #[instrument(name = "event_pipeline_finalize", skip_all, fields(event_type = %raw.event_type))]
    pub async fn finalize(&self, mut raw: RawEvent) -> Result<Event, ContractError> {
        self.sanitize_payloads(&mut raw);
        if let Some(redaction) = raw.redaction.take() {
            raw = self.redactor.redact(raw, &redaction).await?;
        }
        let event = self.assemble(raw);
        Ok(self.truncator.truncate(&event))
    }

    fn sanitize_payloads(&self, raw: &mut RawEvent) {
        for slot in [&mut raw.parameters, &mut raw.response, &mut raw.actor_data] {
            if let Some(value) = slot.as_mut() {
                *value = self.sanitizer.sanitize(value);
            }
        }
    }

    fn assemble(&self, raw: RawEvent) -> Event {
        let payload = |value: Option<Value>| value.map(|v| self.normalizer.normalize(&v));

        Event {
            id: raw.id.unwrap_or_else(new_event_id),
            session_id: raw.session_id,
            project_id: raw.project_id,
            timestamp: raw.timestamp,
            duration_ms: raw.duration_ms,
            event_type: raw.event_type,
            resource_name: raw.resource_name,
            parameters: payload(raw.parameters),
            response: payload(raw.response),
            user_intent: raw.user_intent,
            is_error: raw.is_error,
            error: raw.error,
            actor_id: raw.actor_id,
            actor_name: raw.actor_name,
            actor_data: payload(raw.actor_data),
            client_name: raw.client_name,
            client_version: raw.client_version,
            server_name: raw.server_name,
            server_version: raw.server_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::truncate::serialized_len;
    use contracts::{Object, RedactFn};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(calls: Arc<AtomicUsize>) -> RedactFn {
        RedactFn::new(move |s: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ContractError>(s.replace("secret", "[REDACTED]"))
        })
    }

    #[tokio::test]
    async fn test_generated_id_prefixed() {
        let pipeline = EventPipeline::new(&LimitsConfig::default());
        let event = pipeline.finalize(RawEvent::new("s", "t")).await.unwrap();

        assert!(event.id.starts_with("evt_"));
        assert_eq!(event.id.len(), 4 + 32);
    }

    #[tokio::test]
    async fn test_existing_id_kept() {
        let pipeline = EventPipeline::new(&LimitsConfig::default());
        let mut raw = RawEvent::new("s", "t");
        raw.id = Some("evt_fixed".into());

        assert_eq!(pipeline.finalize(raw).await.unwrap().id, "evt_fixed");
    }

    #[tokio::test]
    async fn test_redaction_runs_once_per_string() {
        let calls = Arc::new(AtomicUsize::new(0));
        let raw = RawEvent::new("s", "t")
            .with_parameters(Value::object([
                ("a", Value::from("my secret")),
                ("b", Value::from("my secret")),
            ]))
            .with_redaction(counting(Arc::clone(&calls)));

        let pipeline = EventPipeline::new(&LimitsConfig::default());
        let event = pipeline.finalize(raw).await.unwrap();

        assert_eq!(
            event.parameters,
            Some(json!({"a": "my [REDACTED]", "b": "my [REDACTED]"}))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_redaction_failure_is_error() {
        let raw = RawEvent::new("s", "t")
            .with_user_intent("x")
            .with_redaction(RedactFn::new(|_: &str| Err::<String, _>("nope")));

        let pipeline = EventPipeline::new(&LimitsConfig::default());
        assert!(pipeline.finalize(raw).await.is_err());
    }

    #[tokio::test]
    async fn test_cyclic_binary_payload_finalized() {
        let obj = Object::new();
        obj.insert("type", Value::from("image"));
        obj.insert("data", Value::from("QUJD"));
        obj.insert("self", Value::Object(obj.clone()));
        let raw = RawEvent::new("s", "t").with_response(Value::Object(obj));

        let pipeline = EventPipeline::new(&LimitsConfig::default());
        let event = pipeline.finalize(raw).await.unwrap();

        assert_eq!(
            event.response,
            Some(json!({"type": "image", "data": "[binary content removed]", "self": "[Circular ~]"}))
        );
    }

    #[tokio::test]
    async fn test_output_within_ceiling() {
        let big = Value::array((0..2_000).map(|i| Value::from(format!("{i}-{}", "z".repeat(200)))));
        let raw = RawEvent::new("s", "t").with_parameters(big);

        let pipeline = EventPipeline::new(&LimitsConfig::default());
        let event = pipeline.finalize(raw).await.unwrap();

        assert!(serialized_len(&event) <= 102_400);
    }

    #[tokio::test]
    async fn test_binary_data_never_reaches_redaction() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let log = Arc::clone(&seen);
        let redaction = RedactFn::new(move |s: &str| {
            log.lock().unwrap().push(s.to_string());
            Ok::<_, ContractError>(if s == "image" { "[hidden]".into() } else { s.to_string() })
        });
        let raw = RawEvent::new("s", "t")
            .with_response(Value::object([
                ("type", Value::from("image")),
                ("data", Value::from("iVBORw0KGgoAAAANSUhEUg")),
            ]))
            .with_redaction(redaction);

        let pipeline = EventPipeline::new(&LimitsConfig::default());
        let event = pipeline.finalize(raw).await.unwrap();

        assert!(!seen.lock().unwrap().iter().any(|s| s.contains("iVBOR")));
        assert_eq!(
            event.response,
            Some(json!({"type": "[hidden]", "data": "[binary content removed]"}))
        );
    }

    #[tokio::test]
    async fn test_deep_shared_dag_finalizes_quickly() {
        let mut value = Value::object([("note", Value::from("secret"))]);
        for _ in 0..40 {
            value = Value::array([value.clone(), value]);
        }
        let raw = RawEvent::new("s", "t")
            .with_parameters(value.clone())
            .with_response(value)
            .with_redaction(counting(Arc::new(AtomicUsize::new(0))));

        let pipeline = EventPipeline::new(&LimitsConfig::default());
        let started = std::time::Instant::now();
        let event = pipeline.finalize(raw).await.unwrap();

        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert!(serialized_len(&event) <= 102_400);
        assert!(event.parameters.is_some());
    }
}
