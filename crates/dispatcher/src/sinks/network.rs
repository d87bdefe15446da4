//! NetworkSink - UDP JSON datagrams
//!
//! One datagram per event. Events larger than `max_packet_size` are rejected
//! rather than fragmented.

use contracts::{ContractError, Event, EventSink};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

/// Default datagram ceiling, below the IPv4 UDP payload limit
const DEFAULT_MAX_PACKET_SIZE: usize = 65_000;

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Max packet size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", s, e))?,
            None => DEFAULT_MAX_PACKET_SIZE,
        };

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Sink that sends events over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: UdpSocket,
    closed: AtomicBool,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr: SocketAddr = if config.addr.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket,
            closed: AtomicBool::new(false),
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.params.addr"), e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(name, e.to_string()))
    }

    fn prepare_payload(&self, event: &Event) -> Result<Vec<u8>, ContractError> {
        let data =
            serde_json::to_vec(event).map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Packet too large, event not sent"
            );
            return Err(ContractError::sink_write(
                &self.name,
                format!("packet of {} bytes exceeds {}", data.len(), self.config.max_packet_size),
            ));
        }
        Ok(data)
    }
}

impl EventSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_deliver",
        skip(self, event),
        fields(sink = %self.name, event_id = %event.id)
    )]
    async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ContractError::sink_write(&self.name, "socket closed"));
        }
        let data = self.prepare_payload(event)?;
        let sent = self
            .socket
            .send(&data)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;

        debug!(sink = %self.name, event_id = %event.id, bytes = sent, "Sent");
        Ok(())
    }

    #[instrument(name = "network_sink_flush", skip(self))]
    async fn flush(&self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        self.closed.store(true, Ordering::Release);
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::tests::sample_event;

    #[test]
    fn test_network_sink_config_parsing() {
        let params = HashMap::from([
            ("addr".to_string(), "127.0.0.1:9999".to_string()),
            ("max_packet_size".to_string(), "1200".to_string()),
        ]);

        let config = NetworkSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.max_packet_size, 1200);
    }

    #[test]
    fn test_network_sink_config_rejects_bad_addr() {
        let params = HashMap::from([("addr".to_string(), "not-an-addr".to_string())]);
        assert!(NetworkSinkConfig::from_params(&params).is_err());
        assert!(NetworkSinkConfig::from_params(&HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn test_network_sink_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        };

        let sink = NetworkSink::new("test_net", config).await.unwrap();
        sink.deliver(&sample_event("evt_udp")).await.unwrap();

        let mut buf = vec![0u8; 65_536];
        let len = receiver.recv(&mut buf).await.unwrap();
        let event: Event = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(event.id, "evt_udp");
    }

    #[tokio::test]
    async fn test_oversized_event_rejected() {
        let config = NetworkSinkConfig {
            addr: "127.0.0.1:19998".parse().unwrap(),
            max_packet_size: 16,
        };

        let sink = NetworkSink::new("test_net", config).await.unwrap();
        let err = sink.deliver(&sample_event("evt_big")).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
    }

    #[tokio::test]
    async fn test_deliver_after_close_fails() {
        let config = NetworkSinkConfig {
            addr: "127.0.0.1:19997".parse().unwrap(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        };

        let sink = NetworkSink::new("test_net", config).await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.deliver(&sample_event("evt_1")).await.is_err());
    }
}
