//! Source trait for inbound datagrams

use std::net::SocketAddr;

/// Something the transport can receive datagrams from.
///
/// Sources abstract over a live UDP socket and scripted replays. A source
/// may wait as long as it likes; the transport bounds every receive with
/// its own timeout and drops the future when that expires, so `recv` must
/// be cancel-safe.
#[async_trait::async_trait]
pub trait DatagramSource: Send {
    /// Receive one datagram into `buf`
    ///
    /// Returns:
    /// - `Ok(Some((len, sender)))` - `buf[..len]` holds a datagram from `sender`
    /// - `Ok(None)` - Source is exhausted (normal termination)
    /// - `Err(e)` - Receive failed; the transport reports it and keeps going
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<Option<(usize, SocketAddr)>>;
}
