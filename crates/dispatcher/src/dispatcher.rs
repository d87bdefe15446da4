//! Sink and queue construction from configuration

use tracing::{info, instrument};

use contracts::{RetryConfig, SinkConfig, SinkType, TelemetryConfig};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::queue::DeliveryQueue;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config, retry),
    fields(sink = %config.name, sink_type = ?config.sink_type, role = ?config.role)
)]
pub async fn create_sink_handle(
    config: &SinkConfig,
    retry: &RetryConfig,
) -> Result<SinkHandle, DispatcherError> {
    let retry = retry.clone();
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::new(sink, config.role, retry))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::new(sink, config.role, retry))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::new(sink, config.role, retry))
        }
    }
}

/// Build a running DeliveryQueue with every configured sink registered
#[instrument(
    name = "dispatcher_create_delivery_queue",
    skip(config),
    fields(sink_count = config.sinks.len())
)]
pub async fn create_delivery_queue(config: &TelemetryConfig) -> Result<DeliveryQueue, DispatcherError> {
    let mut builder = DeliveryQueue::builder(config.delivery.clone()).limits(&config.limits);
    for sink_config in &config.sinks {
        let handle = create_sink_handle(sink_config, &config.delivery.retry).await?;
        builder = builder.sink_handle(handle);
    }

    let queue = builder.build()?;
    info!(sinks = config.sinks.len(), "Delivery queue created from config");
    Ok(queue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RawEvent, SinkRole};
    use std::collections::HashMap;
    use std::time::Duration;

    fn sink(name: &str, sink_type: SinkType, params: HashMap<String, String>) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type,
            role: SinkRole::Primary,
            params,
        }
    }

    #[tokio::test]
    async fn test_create_delivery_queue_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let config = TelemetryConfig {
            sinks: vec![
                sink("log", SinkType::Log, HashMap::new()),
                sink(
                    "file",
                    SinkType::File,
                    HashMap::from([("path".to_string(), path.display().to_string())]),
                ),
            ],
            ..Default::default()
        };

        let queue = create_delivery_queue(&config).await.unwrap();
        queue.enqueue(RawEvent::new("ses_1", "tools/call"));
        let report = queue.shutdown(Duration::from_secs(5)).await;

        assert!(report.drained);
        let names: Vec<String> = queue.sink_metrics().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["log", "file"]);
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_file_sink_without_path_rejected() {
        let config = sink("file", SinkType::File, HashMap::new());
        let err = create_sink_handle(&config, &RetryConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatcherError::SinkCreation { ref name, .. } if name == "file"));
    }
}
