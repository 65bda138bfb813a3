//! Datagram transports
//!
//! `UdpTransport` sends fire-and-forget datagrams from one unconnected socket.
//! `MemoryTransport` records datagrams instead; used by tests and dry runs.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{ContractError, DatagramTransport};
use tokio::net::UdpSocket;
use tracing::{debug, instrument, trace};

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM: usize = 65_507;

/// UDP transport over a single socket bound to an ephemeral port
#[derive(Debug)]
pub struct UdpTransport {
    name: String,
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind to `0.0.0.0:0`
    #[instrument(name = "udp_transport_bind", skip(name))]
    pub async fn bind(name: impl Into<String>) -> std::io::Result<Self> {
        Self::bind_to(name, "0.0.0.0:0").await
    }

    pub async fn bind_to(name: impl Into<String>, local: &str) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind(local).await?;
        debug!(transport = %name, local = ?socket.local_addr().ok(), "UDP transport bound");
        Ok(Self { name, socket })
    }
}

impl DatagramTransport for UdpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_to(&self, payload: &[u8], address: &str, port: u16) -> Result<usize, ContractError> {
        let target = format!("{address}:{port}");
        if payload.len() > MAX_DATAGRAM {
            return Err(ContractError::sink_send(
                &target,
                format!("payload of {} bytes exceeds datagram limit", payload.len()),
            ));
        }
        let sent = self
            .socket
            .send_to(payload, (address, port))
            .await
            .map_err(|e| ContractError::sink_send(&target, e.to_string()))?;
        trace!(transport = %self.name, %target, bytes = sent, "datagram sent");
        Ok(sent)
    }
}

/// Recorded datagram
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram {
    pub address: String,
    pub port: u16,
    pub payload: Bytes,
}

/// In-memory transport; clones share one log
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<Datagram>>>,
    failing_ports: Arc<Mutex<Vec<u16>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `port` fail
    pub fn fail_port(&self, port: u16) {
        self.failing_ports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(port);
    }

    /// Drain recorded datagrams
    pub fn take(&self) -> Vec<Datagram> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Recorded datagrams sent to `port`
    pub fn sent_to(&self, port: u16) -> Vec<Datagram> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|d| d.port == port)
            .cloned()
            .collect()
    }
}

impl DatagramTransport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send_to(&self, payload: &[u8], address: &str, port: u16) -> Result<usize, ContractError> {
        let failing = self
            .failing_ports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&port);
        if failing {
            return Err(ContractError::sink_send(
                format!("{address}:{port}"),
                "port marked failing",
            ));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Datagram {
                address: address.to_string(),
                port,
                payload: Bytes::copy_from_slice(payload),
            });
        Ok(payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_send_reaches_receiver() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let transport = UdpTransport::bind("udp").await.unwrap();

        let sent = transport.send_to(b"hello", "127.0.0.1", port).await.unwrap();
        assert_eq!(sent, 5);

        let mut buf = [0u8; 16];
        let (n, _) = tokio::time::timeout(std::time::Duration::from_secs(5), receiver.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn test_udp_rejects_oversized_payload() {
        let transport = UdpTransport::bind("udp").await.unwrap();
        let payload = vec![0u8; MAX_DATAGRAM + 1];
        let err = transport.send_to(&payload, "127.0.0.1", 9).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkSend { .. }));
    }

    #[tokio::test]
    async fn test_memory_transport_records_and_fails() {
        let transport = MemoryTransport::new();
        transport.fail_port(2);
        transport.send_to(b"a", "h", 1).await.unwrap();
        assert!(transport.send_to(b"b", "h", 2).await.is_err());
        assert_eq!(transport.sent_to(1).len(), 1);
        assert_eq!(transport.take().len(), 1);
        assert!(transport.take().is_empty());
    }
}
