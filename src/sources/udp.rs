//! UDP socket source

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::info;

use crate::source::DatagramSource;
use crate::{LinkError, Result};

/// Source backed by a bound UDP socket.
#[derive(Debug)]
pub struct UdpSource {
    socket: UdpSocket,
}

impl UdpSource {
    /// Bind the receive socket.
    ///
    /// Binding is the one step the link cannot run without; callers abort on
    /// failure rather than retrying.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|err| LinkError::bind_failed(addr, err))?;
        let local = socket.local_addr().map_err(|err| LinkError::bind_failed(addr, err))?;
        info!("Telemetry socket bound on {}", local);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Underlying socket, for sending uplink traffic to the vehicle.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

#[async_trait::async_trait]
impl DatagramSource for UdpSource {
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<Option<(usize, SocketAddr)>> {
        // One datagram is one frame; recv_from never merges or splits them
        self.socket.recv_from(buf).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receives_datagrams_from_a_local_peer() {
        let mut source = UdpSource::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let target = source.local_addr().unwrap();

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        peer.send_to(&[254, 0, 1, 1, 1, 0, 0, 0], target).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, sender) = source.recv(&mut buf).await.unwrap().unwrap();
        assert_eq!(len, 8);
        assert_eq!(sender, peer.local_addr().unwrap());
        assert_eq!(buf[0], 254);

        // The same socket carries uplink traffic back to the sender
        source.socket().send_to(&buf[..len], sender).await.unwrap();
        let mut echo = [0u8; 64];
        let (echoed, from) = peer.recv_from(&mut echo).await.unwrap();
        assert_eq!((echoed, from), (8, target));
    }

    #[tokio::test]
    async fn bind_failure_names_the_address() {
        let first = UdpSource::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let err = UdpSource::bind(taken).await.unwrap_err();
        assert!(matches!(err, LinkError::Bind { addr, .. } if addr == taken));
    }
}
