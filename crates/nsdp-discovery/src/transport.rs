//! UDP broadcast transport for NSDP

use async_trait::async_trait;
use bytes::Bytes;
use nsdp_core::wire::{CLIENT_PORT, DEVICE_PORT, MAX_DATAGRAM_LEN};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to create UDP socket: {0}")]
    Socket(#[source] io::Error),
    #[error("failed to enable broadcast: {0}")]
    Broadcast(#[source] io::Error),
    #[error("failed to bind to interface {interface}: {source}")]
    BindDevice {
        interface: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind UDP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("failed to send datagram: {0}")]
    Send(#[source] io::Error),
    #[error("failed to receive datagram: {0}")]
    Receive(#[source] io::Error),
}

/// Datagram transport used by a discovery exchange
#[async_trait]
pub trait Transport: Send {
    /// Send one datagram as a link-local broadcast
    async fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Wait up to `timeout` for one datagram; `None` when nothing arrived
    async fn receive(&mut self, timeout: Duration) -> Result<Option<Bytes>, TransportError>;
}

/// Socket parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Interface to pin the socket to
    pub interface: Option<String>,
    /// Local port replies arrive on
    pub listen_port: u16,
    /// Port switches listen on
    pub device_port: u16,
    pub broadcast_address: Ipv4Addr,
    /// Largest datagram accepted
    pub receive_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            interface: None,
            listen_port: CLIENT_PORT,
            device_port: DEVICE_PORT,
            broadcast_address: Ipv4Addr::BROADCAST,
            receive_buffer: MAX_DATAGRAM_LEN,
        }
    }
}

/// Broadcast UDP socket bound to the NSDP client port
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Create and bind the socket. Must be called from within a tokio runtime.
    pub fn bind(config: &TransportConfig) -> Result<Self, TransportError> {
        let std_socket = create_broadcast_socket(config)?;
        let socket = UdpSocket::from_std(std_socket).map_err(TransportError::Socket)?;
        let target = SocketAddr::V4(SocketAddrV4::new(config.broadcast_address, config.device_port));

        debug!(
            port = config.listen_port,
            interface = config.interface.as_deref().unwrap_or("*"),
            target = %target,
            "NSDP socket ready"
        );

        Ok(Self {
            socket,
            target,
            buf: vec![0u8; config.receive_buffer],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send_to(bytes, self.target)
            .await
            .map_err(TransportError::Send)?;
        Ok(())
    }

    async fn receive(&mut self, duration: Duration) -> Result<Option<Bytes>, TransportError> {
        if duration.is_zero() {
            return Ok(None);
        }

        match timeout(duration, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((len, addr))) => {
                debug!(from = %addr, len = len, "Received datagram");
                Ok(Some(Bytes::copy_from_slice(&self.buf[..len])))
            }
            Ok(Err(e)) => Err(TransportError::Receive(e)),
            Err(_) => Ok(None),
        }
    }
}

/// Build the IPv4 socket: address reuse, broadcast, optional interface pin.
fn create_broadcast_socket(config: &TransportConfig) -> Result<std::net::UdpSocket, TransportError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(TransportError::Socket)?;

    socket
        .set_reuse_address(true)
        .map_err(TransportError::Socket)?;
    socket.set_broadcast(true).map_err(TransportError::Broadcast)?;

    if let Some(interface) = &config.interface {
        bind_to_interface(&socket, interface)?;
    }

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.listen_port));
    socket.bind(&addr.into()).map_err(|source| TransportError::Bind {
        port: config.listen_port,
        source,
    })?;

    socket
        .set_nonblocking(true)
        .map_err(TransportError::Socket)?;

    Ok(socket.into())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn bind_to_interface(socket: &Socket, interface: &str) -> Result<(), TransportError> {
    socket
        .bind_device(Some(interface.as_bytes()))
        .map_err(|source| TransportError::BindDevice {
            interface: interface.to_string(),
            source,
        })
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn bind_to_interface(_socket: &Socket, interface: &str) -> Result<(), TransportError> {
    tracing::warn!(
        interface = interface,
        "Binding to an interface is not supported on this platform, using all interfaces"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_protocol_ports() {
        let config = TransportConfig::default();
        assert_eq!(config.listen_port, 63321);
        assert_eq!(config.device_port, 63322);
        assert_eq!(config.broadcast_address, Ipv4Addr::BROADCAST);
        assert_eq!(config.receive_buffer, 2048);
        assert!(config.interface.is_none());
    }

    #[tokio::test]
    async fn test_zero_timeout_receive_returns_none() {
        let config = TransportConfig {
            listen_port: 0,
            ..TransportConfig::default()
        };
        let mut transport = UdpTransport::bind(&config).unwrap();
        assert!(transport.local_addr().unwrap().port() != 0);
        assert!(transport.receive(Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_receive_times_out_without_data() {
        let config = TransportConfig {
            listen_port: 0,
            ..TransportConfig::default()
        };
        let mut transport = UdpTransport::bind(&config).unwrap();
        let received = transport.receive(Duration::from_millis(20)).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_receive_datagram_on_loopback() {
        let config = TransportConfig {
            listen_port: 0,
            ..TransportConfig::default()
        };
        let mut transport = UdpTransport::bind(&config).unwrap();
        let port = transport.local_addr().unwrap().port();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"NSDP reply", ("127.0.0.1", port)).await.unwrap();

        let received = transport.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(received.as_deref(), Some(&b"NSDP reply"[..]));
    }
}
