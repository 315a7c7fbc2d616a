//! Core types shared by the transport and its handlers.
//!
//! - [`RawDatagram`] is one received datagram, borrowed for a single dispatch
//! - [`PeerAddress`] is the trusted sender every datagram is checked against
//! - [`Tier`] names the four periodic callback rates

mod datagram;
mod tier;

pub use datagram::{FRAME_OVERHEAD, MAVLINK_V1_MAGIC, PeerAddress, RawDatagram};
pub use tier::Tier;
