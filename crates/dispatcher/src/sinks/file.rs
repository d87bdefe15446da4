//! FileSink - appends events to a JSON Lines file

use contracts::{ContractError, Event, EventSink};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, created (with parents) if missing and appended to
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Sink that writes one JSON object per line
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    #[instrument(name = "file_sink_open", skip(name, config), fields(path = %config.path.display()))]
    pub async fn open(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await?;

        Ok(Self {
            name: name.into(),
            config,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Create from params map (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.params.path"), e))?;

        Self::open(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(name, e.to_string()))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.config.path
    }

    fn encode(&self, event: &Event) -> Result<Vec<u8>, ContractError> {
        let mut line =
            serde_json::to_vec(event).map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        line.push(b'\n');
        Ok(line)
    }
}

impl EventSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_deliver",
        skip(self, event),
        fields(sink = %self.name, event_id = %event.id)
    )]
    async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
        let line = self.encode(event)?;
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| ContractError::sink_write(&self.name, "sink closed"))?;

        writer.write_all(&line).await.map_err(|e| {
            error!(sink = %self.name, event_id = %event.id, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.lock().await.as_mut() {
            writer
                .flush()
                .await
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer
                .shutdown()
                .await
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
