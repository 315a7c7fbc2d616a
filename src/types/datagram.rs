//! Datagram and peer address types

use std::net::{IpAddr, SocketAddr};

/// Leading byte of every MAVLink v1 frame.
pub const MAVLINK_V1_MAGIC: u8 = 254;

/// Bytes in a frame that are not payload: magic, length, sequence, system id,
/// component id, message id and the two checksum bytes.
pub const FRAME_OVERHEAD: usize = 8;

/// One received datagram, borrowed from the transport's receive buffer.
///
/// Valid only for the duration of a single receive; handlers are given the
/// byte slice and never the datagram itself.
#[derive(Debug, Clone, Copy)]
pub struct RawDatagram<'a> {
    bytes: &'a [u8],
    sender: SocketAddr,
}

impl<'a> RawDatagram<'a> {
    pub fn new(bytes: &'a [u8], sender: SocketAddr) -> Self {
        Self { bytes, sender }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn sender(&self) -> SocketAddr {
        self.sender
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The single trusted source of telemetry.
///
/// Matching is on IP only; the forwarder sends from an ephemeral port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress(IpAddr);

impl PeerAddress {
    pub fn new(ip: IpAddr) -> Self {
        Self(ip)
    }

    pub fn ip(&self) -> IpAddr {
        self.0
    }

    /// Check whether a datagram sender is this peer.
    pub fn matches(&self, sender: &SocketAddr) -> bool {
        sender.ip() == self.0
    }
}

impl From<IpAddr> for PeerAddress {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
