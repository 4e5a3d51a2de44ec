//! Checksummed frame codec.
//!
//! Data frame:
//! ```text
//! ┌──────┬─────┬──────────┬───────────┬─────────────┬─────┐
//! │ 0x5A │ len │ selector │ id (4B LE)│ payload     │ sum │
//! └──────┴─────┴──────────┴───────────┴─────────────┴─────┘
//!   0      1     2          3..7        7..len-1      len-1
//! ```
//! `len` counts every byte including head and checksum. `sum` is the
//! wrapping byte sum of `[0, len-2]`.
//!
//! ACK frame (no length, no checksum):
//! ```text
//! ┌──────┬───────────┐
//! │ 0xAA │ id (4B LE)│
//! └──────┴───────────┘
//! ```

use heapless::Vec;

use super::selector::Selector;
use crate::error::FrameError;

/// Data frame marker.
pub const FRAME_HEAD: u8 = 0x5A;

/// ACK frame marker.
pub const ACK_HEAD: u8 = 0xAA;

/// head + len + selector + id.
pub const HEADER_LEN: usize = 7;

/// Header plus trailing checksum byte.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + 1;

/// Largest frame the one-byte length field can describe.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// Largest payload that fits in one frame.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - FRAME_OVERHEAD;

/// ACK frame size on the wire.
pub const ACK_FRAME_LEN: usize = 5;

/// Correlates a data frame with its ACK. Wraps at 2^32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PacketId(pub u32);

impl PacketId {
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

/// Wrapping additive checksum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// An encoded, immutable data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8, MAX_FRAME_LEN>,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn selector(&self) -> Selector {
        Selector::from_byte(self.bytes[2])
    }

    pub fn packet_id(&self) -> PacketId {
        PacketId::from_le_bytes([self.bytes[3], self.bytes[4], self.bytes[5], self.bytes[6]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..self.bytes.len() - 1]
    }
}

/// Build a data frame.
pub fn encode_frame(
    selector: Selector,
    packet_id: PacketId,
    payload: &[u8],
) -> Result<Frame, FrameError> {
    let total = payload.len() + FRAME_OVERHEAD;
    if total > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge);
    }

    let mut bytes: Vec<u8, MAX_FRAME_LEN> = Vec::new();
    bytes
        .extend_from_slice(&[FRAME_HEAD, total as u8, selector.to_byte()])
        .map_err(|_| FrameError::TooLarge)?;
    bytes
        .extend_from_slice(&packet_id.to_le_bytes())
        .map_err(|_| FrameError::TooLarge)?;
    bytes
        .extend_from_slice(payload)
        .map_err(|_| FrameError::TooLarge)?;
    let sum = checksum(&bytes);
    bytes.push(sum).map_err(|_| FrameError::TooLarge)?;

    Ok(Frame { bytes })
}

/// A validated frame borrowed from a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    pub selector: Selector,
    pub packet_id: PacketId,
    pub payload: &'a [u8],
}

/// Check the declared length byte.
pub fn check_length(len: u8) -> Result<usize, FrameError> {
    let len = len as usize;
    if !(FRAME_OVERHEAD..=MAX_FRAME_LEN).contains(&len) {
        return Err(FrameError::BadLength);
    }
    Ok(len)
}

/// Validate and decode the data frame at the start of `raw`.
///
/// Bytes beyond the declared length are ignored.
pub fn decode_frame(raw: &[u8]) -> Result<FrameView<'_>, FrameError> {
    match raw.first() {
        Some(&FRAME_HEAD) => {}
        Some(_) => return Err(FrameError::BadHead),
        None => return Err(FrameError::ShortRead),
    }
    let len = check_length(*raw.get(1).ok_or(FrameError::ShortRead)?)?;
    if raw.len() < len {
        return Err(FrameError::ShortRead);
    }

    let frame = &raw[..len];
    if checksum(&frame[..len - 1]) != frame[len - 1] {
        return Err(FrameError::BadChecksum);
    }

    Ok(FrameView {
        selector: Selector::from_byte(frame[2]),
        packet_id: PacketId::from_le_bytes([frame[3], frame[4], frame[5], frame[6]]),
        payload: &frame[HEADER_LEN..len - 1],
    })
}

/// Build the ACK frame echoing `packet_id`.
pub fn encode_ack(packet_id: PacketId) -> [u8; ACK_FRAME_LEN] {
    let id = packet_id.to_le_bytes();
    [ACK_HEAD, id[0], id[1], id[2], id[3]]
}

/// Decode an ACK frame.
pub fn decode_ack(raw: &[u8]) -> Result<PacketId, FrameError> {
    match raw {
        [ACK_HEAD, a, b, c, d, ..] => Ok(PacketId::from_le_bytes([*a, *b, *c, *d])),
        [ACK_HEAD, ..] => Err(FrameError::BadAck),
        _ => Err(FrameError::BadHead),
    }
}

// ── Tests ────────────────────────────────────────────────────
