//! Scripted replay source

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, trace};

use crate::source::DatagramSource;

/// One scripted step of a replay.
#[derive(Debug, Clone)]
pub enum ReplayItem {
    /// Deliver these bytes as if sent by `sender`
    Datagram { bytes: Vec<u8>, sender: SocketAddr },
    /// Go quiet for a while before the next item
    Stall(Duration),
    /// Fail the receive with this error kind
    Error(std::io::ErrorKind),
}

/// Source that plays back a fixed script of datagrams, silences and errors.
///
/// Used to feed recorded or synthetic traffic through the same transport the
/// live socket uses. A stall is consumed when it starts, so a stall longer
/// than the transport's receive timeout shows up as a single timeout and the
/// replay resumes with the next item. Once the script is exhausted the
/// source reports end of stream.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    items: VecDeque<ReplayItem>,
    delivered: usize,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a datagram.
    pub fn datagram(mut self, sender: SocketAddr, bytes: impl Into<Vec<u8>>) -> Self {
        self.items.push_back(ReplayItem::Datagram { bytes: bytes.into(), sender });
        self
    }

    /// Queue a silence.
    pub fn stall(mut self, duration: Duration) -> Self {
        self.items.push_back(ReplayItem::Stall(duration));
        self
    }

    /// Queue a receive failure.
    pub fn error(mut self, kind: std::io::ErrorKind) -> Self {
        self.items.push_back(ReplayItem::Error(kind));
        self
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    /// Datagrams handed out so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl FromIterator<ReplayItem> for ReplaySource {
    fn from_iter<I: IntoIterator<Item = ReplayItem>>(iter: I) -> Self {
        Self { items: iter.into_iter().collect(), delivered: 0 }
    }
}

#[async_trait::async_trait]
impl DatagramSource for ReplaySource {
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<Option<(usize, SocketAddr)>> {
        loop {
            match self.items.pop_front() {
                None => {
                    debug!("Replay exhausted after {} datagrams", self.delivered);
                    return Ok(None);
                }
                Some(ReplayItem::Stall(duration)) => {
                    trace!("Replay stalling for {:?}", duration);
                    tokio::time::sleep(duration).await;
                }
                Some(ReplayItem::Error(kind)) => {
                    return Err(std::io::Error::new(kind, "scripted receive failure"));
                }
                Some(ReplayItem::Datagram { bytes, sender }) => {
                    // Oversized datagrams are truncated like a real socket would
                    let len = bytes.len().min(buf.len());
                    buf[..len].copy_from_slice(&bytes[..len]);
                    self.delivered += 1;
                    return Ok(Some((len, sender)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::peer_addr;

    #[tokio::test]
    async fn plays_items_in_order_then_ends() {
        let mut source = ReplaySource::new()
            .datagram(peer_addr(), vec![1, 2, 3])
            .error(std::io::ErrorKind::ConnectionRefused)
            .datagram(peer_addr(), vec![4]);
        let mut buf = [0u8; 16];

        assert_eq!(source.recv(&mut buf).await.unwrap(), Some((3, peer_addr())));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        let err = source.recv(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
        assert_eq!(source.recv(&mut buf).await.unwrap(), Some((1, peer_addr())));
        assert_eq!(source.recv(&mut buf).await.unwrap(), None);
        assert_eq!(source.delivered(), 2);
    }

    #[tokio::test]
    async fn collected_script_tracks_remaining_items() {
        let mut source: ReplaySource = [
            ReplayItem::Datagram { bytes: vec![1], sender: peer_addr() },
            ReplayItem::Stall(Duration::ZERO),
            ReplayItem::Datagram { bytes: vec![2, 3], sender: peer_addr() },
        ]
        .into_iter()
        .collect();
        let mut buf = [0u8; 4];

        assert_eq!(source.remaining(), 3);
        assert_eq!(source.recv(&mut buf).await.unwrap(), Some((1, peer_addr())));
        assert_eq!(source.remaining(), 2);
        // The stall is consumed on the way to the next datagram
        assert_eq!(source.recv(&mut buf).await.unwrap(), Some((2, peer_addr())));
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.delivered(), 2);
    }

    #[tokio::test]
    async fn truncates_to_buffer() {
        let mut source = ReplaySource::new().datagram(peer_addr(), vec![9; 32]);
        let mut buf = [0u8; 8];
        assert_eq!(source.recv(&mut buf).await.unwrap(), Some((8, peer_addr())));
    }

    #[tokio::test(start_paused = true)]
    async fn stall_delays_next_item() {
        let mut source =
            ReplaySource::new().stall(Duration::from_secs(2)).datagram(peer_addr(), vec![7]);
        let mut buf = [0u8; 4];

        let start = tokio::time::Instant::now();
        assert_eq!(source.recv(&mut buf).await.unwrap(), Some((1, peer_addr())));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
