//! # Integration Tests
//!
//! Cross-crate end-to-end scenarios:
//! - config file to delivered JSON lines
//! - custom sinks through the public builder
//! - backpressure and shutdown behaviour seen from outside the queue

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ContractError, DeliveryConfig, ErrorPayload, Event, EventSink, Object, RawEvent,
        RedactFn, SinkRole, Value,
    };
    use dispatcher::{create_delivery_queue, DeliveryQueue};
    use tokio::sync::Semaphore;

    const SECRET: &str = "sk-live-4242";

    /// Sink that records every event and can be held closed
    #[derive(Clone)]
    struct GatedSink {
        events: Arc<Mutex<Vec<Event>>>,
        gate: Arc<Semaphore>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl GatedSink {
        fn open() -> Self {
            Self::with_permits(Semaphore::MAX_PERMITS)
        }

        fn with_permits(permits: usize) -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
                gate: Arc::new(Semaphore::new(permits)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn ids(&self) -> Vec<String> {
            self.events.lock().unwrap().iter().map(|e| e.id.clone()).collect()
        }
    }

    impl EventSink for GatedSink {
        fn name(&self) -> &str {
            "gated"
        }

        async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ContractError::sink_write("gated", e.to_string()))?;
            permit.forget();

            self.events.lock().unwrap().push(event.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn flush(&self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn secret_redactor() -> RedactFn {
        RedactFn::new(|text: &str| Ok::<_, ContractError>(text.replace(SECRET, "[KEY]")))
    }

    fn cyclic_payload() -> Value {
        let node = Object::new();
        node.insert("name", Value::from("root"));
        node.insert("self", Value::Object(node.clone()));
        Value::Object(node)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..500 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_config_file_to_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("events.jsonl");
        let config = ConfigLoader::load_from_str(
            &format!(
                r#"
[delivery]
max_concurrency = 3

[limits]
max_event_bytes = 8192

[[sinks]]
name = "audit"
sink_type = "file"
[sinks.params]
path = "{}"
"#,
                output.display()
            ),
            ConfigFormat::Toml,
        )
        .unwrap();

        let queue = create_delivery_queue(&config).await.unwrap();

        queue.enqueue(
            RawEvent::new(format!("ses_{SECRET}"), "tools/call")
                .with_parameters(Value::object([("apiKey", Value::from(SECRET))]))
                .with_redaction(secret_redactor()),
        );
        queue.enqueue(
            RawEvent::new("ses_big", "tools/call")
                .with_response(Value::from("x".repeat(200_000)))
                .with_error(ErrorPayload::new("Error", "y".repeat(10_000))),
        );
        queue.enqueue(RawEvent::new("ses_cycle", "tools/list").with_parameters(cyclic_payload()));
        let mut fixed = RawEvent::new("ses_fixed", "ping");
        fixed.id = Some("evt_fixed".into());
        queue.enqueue(fixed);

        let report = queue.shutdown(Duration::from_secs(5)).await;
        assert!(report.drained);

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        for line in &lines {
            assert!(line.len() <= 8192, "line of {} bytes", line.len());
        }

        let events: Vec<Event> = lines
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let by_session = |session: &str| {
            events
                .iter()
                .find(|e| e.session_id == session)
                .unwrap_or_else(|| panic!("missing {session}"))
        };

        let redacted = by_session(&format!("ses_{SECRET}"));
        assert_eq!(
            redacted.parameters,
            Some(serde_json::json!({"apiKey": "[KEY]"}))
        );

        let big = by_session("ses_big");
        assert!(big.is_error);
        let message = &big.error.as_ref().unwrap().message;
        assert!(message.starts_with("yyy"));
        assert!(message.chars().count() <= 2048 + 3);

        let cycle = by_session("ses_cycle");
        assert_eq!(
            cycle.parameters,
            Some(serde_json::json!({"name": "root", "self": "[Circular ~]"}))
        );

        assert_eq!(by_session("ses_fixed").id, "evt_fixed");

        let ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
        assert!(ids.iter().all(|id| id.starts_with("evt_")));
    }

    #[tokio::test]
    async fn test_custom_sink_exactly_once_under_cap() {
        let sink = GatedSink::open();
        let queue = DeliveryQueue::builder(DeliveryConfig {
            max_concurrency: 4,
            ..Default::default()
        })
        .sink(sink.clone(), SinkRole::Primary)
        .build()
        .unwrap();

        for i in 0..200 {
            let mut raw = RawEvent::new("ses_load", "tools/call");
            raw.id = Some(format!("evt_{i:03}"));
            queue.enqueue(raw);
        }

        let report = queue.shutdown(Duration::from_secs(10)).await;
        assert!(report.drained);

        let mut ids = sink.ids();
        ids.sort();
        let expected: Vec<String> = (0..200).map(|i| format!("evt_{i:03}")).collect();
        assert_eq!(ids, expected);
        assert!(sink.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(queue.sink_metrics()[0].1.delivered, 200);
    }

    #[tokio::test]
    async fn test_full_queue_evicts_oldest() {
        let sink = GatedSink::with_permits(0);
        let queue = DeliveryQueue::builder(DeliveryConfig {
            max_queue_size: 5,
            max_concurrency: 1,
            ..Default::default()
        })
        .sink(sink.clone(), SinkRole::Primary)
        .build()
        .unwrap();

        let mut first = RawEvent::new("ses_q", "tools/call");
        first.id = Some("evt_first".into());
        queue.enqueue(first);
        let in_flight = sink.in_flight.clone();
        wait_until(|| in_flight.load(Ordering::SeqCst) == 1).await;

        for i in 0..10 {
            let mut raw = RawEvent::new("ses_q", "tools/call");
            raw.id = Some(format!("evt_{i}"));
            queue.enqueue(raw);
        }

        let stats = queue.stats();
        assert_eq!(stats.queue_length, 5);
        assert_eq!(stats.active_deliveries, 1);
        assert!(stats.is_dispatching);
        assert_eq!(queue.metrics().evicted, 5);

        sink.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        let report = queue.shutdown(Duration::from_secs(5)).await;
        assert!(report.drained);

        let mut ids = sink.ids();
        ids.sort();
        assert_eq!(ids, vec!["evt_5", "evt_6", "evt_7", "evt_8", "evt_9", "evt_first"]);
    }

    #[tokio::test]
    async fn test_shutdown_timeout_discards_backlog() {
        let sink = GatedSink::with_permits(0);
        let queue = DeliveryQueue::builder(DeliveryConfig {
            max_concurrency: 1,
            poll_interval_ms: 10,
            ..Default::default()
        })
        .sink(sink.clone(), SinkRole::Primary)
        .build()
        .unwrap();

        for _ in 0..3 {
            queue.enqueue(RawEvent::new("ses_slow", "tools/call"));
        }
        let in_flight = sink.in_flight.clone();
        wait_until(|| in_flight.load(Ordering::SeqCst) == 1).await;

        let report = queue.shutdown(Duration::from_millis(50)).await;
        assert!(report.timed_out());
        assert_eq!(report.discarded, 2);
        assert_eq!(report.abandoned_active, 1);
        assert_eq!(queue.stats().queue_length, 0);

        queue.enqueue(RawEvent::new("ses_late", "tools/call"));
        assert_eq!(queue.metrics().rejected, 1);
        assert_eq!(queue.shutdown(Duration::from_secs(1)).await, report);
    }

    #[tokio::test]
    async fn test_failed_redaction_drops_only_that_event() {
        let sink = GatedSink::open();
        let queue = DeliveryQueue::builder(DeliveryConfig::default())
            .sink(sink.clone(), SinkRole::Primary)
            .build()
            .unwrap();

        let failing = RedactFn::new(|_: &str| Err::<String, _>("vault unreachable"));
        let mut bad = RawEvent::new("ses_bad", "tools/call")
            .with_user_intent("look up the account")
            .with_redaction(failing);
        bad.id = Some("evt_bad".into());
        queue.enqueue(bad);

        let mut good = RawEvent::new("ses_good", "tools/call");
        good.id = Some("evt_good".into());
        queue.enqueue(good);

        assert!(queue.shutdown(Duration::from_secs(5)).await.drained);
        assert_eq!(sink.ids(), vec!["evt_good"]);
        assert_eq!(queue.metrics().redaction_failed, 1);
    }

    #[tokio::test]
    async fn test_pipeline_matches_queue_output() {
        let pipeline = transform::EventPipeline::default();
        let event = pipeline
            .finalize(
                RawEvent::new("ses_direct", "resources/read")
                    .with_resource_name("file:///etc/hosts")
                    .with_parameters(Value::array((0..5_000i64).map(Value::from))),
            )
            .await
            .unwrap();

        assert!(transform::serialized_len(&event) <= 102_400);
        assert_eq!(event.resource_name.as_deref(), Some("file:///etc/hosts"));
        assert_eq!(event.id.len(), 36);
    }
}
