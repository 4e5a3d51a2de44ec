//! Selector byte: acknowledgment flag plus packet kind.
//!
//! ```text
//!   bit 7      bits 6..4   bits 3..0
//! ┌─────────┬───────────┬───────────┐
//! │ ACK req │ reserved  │   kind    │
//! └─────────┴───────────┴───────────┘
//! ```
//!
//! The raw byte only exists at the codec boundary; everything inside the
//! link works with [`Selector`].

/// Bit 7: sender wants an ACK frame back.
pub const ACK_REQUEST_FLAG: u8 = 0x80;

/// Bits 0-3: payload kind used for dispatch.
pub const KIND_MASK: u8 = 0x0F;

/// Payload kind carried in the low selector bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Handset → receiver: stick axes and key bitmap.
    RemoteControl,
    /// Handset → receiver: virtual item (GUI widget) update.
    RemoteVirtualItem,
    /// Receiver → handset: text for the message box.
    ReceiverMessageBox,
    /// Receiver → handset: virtual item state update.
    ReceiverVirtualItem,
    /// Any other 4-bit kind; opaque to the link.
    Other(u8),
}

impl PacketKind {
    /// Decode the low four bits of a selector byte.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & KIND_MASK {
            0x01 => Self::RemoteControl,
            0x02 => Self::RemoteVirtualItem,
            0x03 => Self::ReceiverMessageBox,
            0x04 => Self::ReceiverVirtualItem,
            other => Self::Other(other),
        }
    }

    /// Four-bit wire value. `Other` values are masked to four bits.
    pub const fn bits(self) -> u8 {
        match self {
            Self::RemoteControl => 0x01,
            Self::RemoteVirtualItem => 0x02,
            Self::ReceiverMessageBox => 0x03,
            Self::ReceiverVirtualItem => 0x04,
            Self::Other(bits) => bits & KIND_MASK,
        }
    }

    /// Same wire value, regardless of how the kind was constructed.
    pub const fn matches(self, other: Self) -> bool {
        self.bits() == other.bits()
    }
}

/// Decoded selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector {
    pub needs_ack: bool,
    pub kind: PacketKind,
}

impl Selector {
    pub const fn new(kind: PacketKind, needs_ack: bool) -> Self {
        Self {
            needs_ack,
            kind: PacketKind::from_bits(kind.bits()),
        }
    }

    /// Fire-and-forget selector.
    pub const fn unacked(kind: PacketKind) -> Self {
        Self::new(kind, false)
    }

    /// Selector that asks the peer for an ACK frame.
    pub const fn acked(kind: PacketKind) -> Self {
        Self::new(kind, true)
    }

    /// Raw byte as transmitted (and checksummed).
    pub const fn to_byte(self) -> u8 {
        let flag = if self.needs_ack { ACK_REQUEST_FLAG } else { 0 };
        flag | self.kind.bits()
    }

    /// Parse a received selector byte. Reserved bits are ignored.
    pub const fn from_byte(byte: u8) -> Self {
        Self {
            needs_ack: byte & ACK_REQUEST_FLAG != 0,
            kind: PacketKind::from_bits(byte),
        }
    }
}
