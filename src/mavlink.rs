//! Minimal MAVLink v1 decoding.
//!
//! Only what the bundled analyzers consume is decoded here: the frame header,
//! the X.25 checksum, and the `EKF_STATUS_REPORT` payload. Every other
//! message surfaces as [`DecodedMessage::Other`] with its id, unverified.
//!
//! # Frame Layout
//!
//! ```text
//! 0      1     2    3      4       5      6 .. 6+len   6+len .. 8+len
//! magic  len   seq  sysid  compid  msgid  payload      crc (little endian)
//! ```
//!
//! The checksum covers bytes `1..6+len` followed by a per-message "CRC extra"
//! byte derived from the message definition.

use tracing::trace;

use crate::types::{FRAME_OVERHEAD, MAVLINK_V1_MAGIC};

/// Message id of `EKF_STATUS_REPORT`.
pub const MSG_ID_EKF_STATUS_REPORT: u8 = 193;

/// CRC extra byte of `EKF_STATUS_REPORT`.
pub const CRC_EXTRA_EKF_STATUS_REPORT: u8 = 71;

const HEADER_LEN: usize = 6;

/// Fixed header fields of a v1 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u8,
    pub seq: u8,
    pub sys_id: u8,
    pub comp_id: u8,
    pub msg_id: u8,
}

impl FrameHeader {
    /// Parse the header of a complete frame.
    ///
    /// Returns `None` if the bytes are not a whole v1 frame.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < FRAME_OVERHEAD || frame[0] != MAVLINK_V1_MAGIC {
            return None;
        }
        let header = Self {
            payload_len: frame[1],
            seq: frame[2],
            sys_id: frame[3],
            comp_id: frame[4],
            msg_id: frame[5],
        };
        (frame.len() == usize::from(header.payload_len) + FRAME_OVERHEAD).then_some(header)
    }
}

/// X.25 (CRC-16/MCRF4XX) accumulation as used by MAVLink.
pub fn crc_accumulate(crc: u16, byte: u8) -> u16 {
    let mut tmp = byte ^ (crc & 0xff) as u8;
    tmp ^= tmp << 4;
    let tmp = u16::from(tmp);
    (crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4)
}

/// Checksum of a frame's header-and-payload bytes plus its CRC extra.
pub fn frame_crc(covered: &[u8], crc_extra: u8) -> u16 {
    let crc = covered.iter().fold(0xffff, |crc, &byte| crc_accumulate(crc, byte));
    crc_accumulate(crc, crc_extra)
}

/// Build a complete v1 frame.
pub fn encode_frame(
    seq: u8,
    sys_id: u8,
    comp_id: u8,
    msg_id: u8,
    payload: &[u8],
    crc_extra: u8,
) -> Vec<u8> {
    let payload_len = u8::try_from(payload.len()).unwrap_or(u8::MAX);
    let payload = &payload[..usize::from(payload_len)];

    let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    frame.extend_from_slice(&[MAVLINK_V1_MAGIC, payload_len, seq, sys_id, comp_id, msg_id]);
    frame.extend_from_slice(payload);
    let crc = frame_crc(&frame[1..], crc_extra);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// `EKF_STATUS_REPORT` payload.
///
/// Wire order follows MAVLink field sorting: the five `f32` variances first,
/// then the `u16` flags.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EkfStatusReport {
    pub velocity_variance: f32,
    pub pos_horiz_variance: f32,
    pub pos_vert_variance: f32,
    pub compass_variance: f32,
    pub terrain_alt_variance: f32,
    pub flags: u16,
}

impl EkfStatusReport {
    pub const PAYLOAD_LEN: usize = 22;

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < Self::PAYLOAD_LEN {
            return None;
        }
        let f = |at: usize| {
            f32::from_le_bytes([payload[at], payload[at + 1], payload[at + 2], payload[at + 3]])
        };
        Some(Self {
            velocity_variance: f(0),
            pos_horiz_variance: f(4),
            pos_vert_variance: f(8),
            compass_variance: f(12),
            terrain_alt_variance: f(16),
            flags: u16::from_le_bytes([payload[20], payload[21]]),
        })
    }

    pub fn encode(&self) -> [u8; Self::PAYLOAD_LEN] {
        let mut out = [0u8; Self::PAYLOAD_LEN];
        let fields = [
            self.velocity_variance,
            self.pos_horiz_variance,
            self.pos_vert_variance,
            self.compass_variance,
            self.terrain_alt_variance,
        ];
        for (i, value) in fields.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        out[20..].copy_from_slice(&self.flags.to_le_bytes());
        out
    }

    /// Complete frame from system 1, autopilot component.
    pub fn to_frame(&self, seq: u8) -> Vec<u8> {
        encode_frame(
            seq,
            1,
            1,
            MSG_ID_EKF_STATUS_REPORT,
            &self.encode(),
            CRC_EXTRA_EKF_STATUS_REPORT,
        )
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    EkfStatusReport(EkfStatusReport),
    /// A message this crate does not decode
    Other { msg_id: u8 },
}

/// Decode a complete frame.
///
/// Returns `None` for malformed frames and for known messages whose checksum
/// or payload length is wrong.
pub fn decode_frame(frame: &[u8]) -> Option<DecodedMessage> {
    let header = FrameHeader::parse(frame)?;
    let end = HEADER_LEN + usize::from(header.payload_len);
    let payload = &frame[HEADER_LEN..end];

    match header.msg_id {
        MSG_ID_EKF_STATUS_REPORT => {
            let expected = frame_crc(&frame[1..end], CRC_EXTRA_EKF_STATUS_REPORT);
            let received = u16::from_le_bytes([frame[end], frame[end + 1]]);
            if expected != received {
                trace!(
                    "EKF_STATUS_REPORT checksum mismatch ({:#06x} != {:#06x})",
                    received, expected
                );
                return None;
            }
            EkfStatusReport::decode(payload).map(DecodedMessage::EkfStatusReport)
        }
        msg_id => Some(DecodedMessage::Other { msg_id }),
    }
}
