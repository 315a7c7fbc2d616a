//! Framing checks applied to every datagram before dispatch.
//!
//! One datagram carries exactly one MAVLink v1 frame, so the checks are
//! cheap and local: the sender must be the trusted peer, and the frame
//! header must be self-consistent with the datagram length. Nothing that
//! fails here reaches a handler.

use std::net::IpAddr;
use thiserror::Error;
use tracing::warn;

use crate::rate_limit::RateLimiter;
use crate::types::{FRAME_OVERHEAD, MAVLINK_V1_MAGIC, PeerAddress, RawDatagram};

/// Why a datagram was discarded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    #[error("received packet not from trusted peer ({sender})")]
    WrongSource { sender: IpAddr },

    #[error("received runt packet ({len} bytes)")]
    Runt { len: usize },

    #[error("received bad magic ({magic:#04x})")]
    BadMagic { magic: u8 },

    #[error("inconsistent length ({declared}, {len})")]
    LengthMismatch { declared: u8, len: usize },
}

/// Stateless datagram validator bound to one trusted peer.
#[derive(Debug, Clone, Copy)]
pub struct PacketValidator {
    peer: PeerAddress,
}

impl PacketValidator {
    pub fn new(peer: PeerAddress) -> Self {
        Self { peer }
    }

    pub fn peer(&self) -> PeerAddress {
        self.peer
    }

    /// Check a datagram, stopping at the first failed rule.
    pub fn validate(&self, datagram: &RawDatagram<'_>) -> Result<(), DropReason> {
        let sender = datagram.sender();
        if !self.peer.matches(&sender) {
            return Err(DropReason::WrongSource { sender: sender.ip() });
        }

        let bytes = datagram.bytes();
        let len = bytes.len();
        if len < FRAME_OVERHEAD {
            return Err(DropReason::Runt { len });
        }
        if bytes[0] != MAVLINK_V1_MAGIC {
            return Err(DropReason::BadMagic { magic: bytes[0] });
        }
        if usize::from(bytes[1]) != len - FRAME_OVERHEAD {
            return Err(DropReason::LengthMismatch { declared: bytes[1], len });
        }
        Ok(())
    }

    /// Validate and, on failure, report the drop through the rate limiter.
    ///
    /// A report the limiter refuses is counted there and otherwise discarded.
    pub fn admit(
        &self,
        datagram: &RawDatagram<'_>,
        limiter: &mut RateLimiter,
    ) -> Result<(), DropReason> {
        self.validate(datagram).inspect_err(|reason| {
            if let Some(skipped) = limiter.try_log() {
                warn!(suppressed = skipped, "[{}] {}", skipped, reason);
            }
        })
    }
}
