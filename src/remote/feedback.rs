//! Receiver → handset text messages.
//!
//! Payload layout: `[type][len][len bytes of UTF-8]`. The handset shows
//! the most recent message in its message box.

use std::sync::{Mutex, PoisonError};

use heapless::{String, Vec};
use log::{info, warn};

use crate::error::PayloadError;
use crate::link::codec::MAX_PAYLOAD_LEN;
use crate::link::registry::{PacketHandler, ReceivedPacket};

/// Longest text that fits one frame after the two header bytes.
pub const MAX_TEXT_LEN: usize = MAX_PAYLOAD_LEN - 2;

/// A decoded text message borrowing the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFeedback<'a> {
    /// Receiver-defined message category.
    pub kind: u8,
    pub text: &'a str,
}

impl<'a> TextFeedback<'a> {
    pub fn decode(payload: &'a [u8]) -> Result<Self, PayloadError> {
        let [kind, len, rest @ ..] = payload else {
            return Err(PayloadError::Truncated);
        };
        let bytes = rest
            .get(..usize::from(*len))
            .ok_or(PayloadError::Truncated)?;
        let text = core::str::from_utf8(bytes).map_err(|_| PayloadError::InvalidText)?;
        Ok(Self { kind: *kind, text })
    }

    pub fn encode(&self) -> Result<Vec<u8, MAX_PAYLOAD_LEN>, PayloadError> {
        if self.text.len() > MAX_TEXT_LEN {
            return Err(PayloadError::TextTooLong);
        }
        let mut out = Vec::new();
        out.extend_from_slice(&[self.kind, self.text.len() as u8])
            .map_err(|_| PayloadError::TextTooLong)?;
        out.extend_from_slice(self.text.as_bytes())
            .map_err(|_| PayloadError::TextTooLong)?;
        Ok(out)
    }
}

/// Latest message for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: u8,
    pub text: String<MAX_TEXT_LEN>,
}

/// Keeps the most recent receiver message. Register it for
/// [`PacketKind::ReceiverMessageBox`](crate::link::selector::PacketKind).
#[derive(Debug, Default)]
pub struct MessageBox {
    latest: Mutex<Option<Message>>,
}

impl MessageBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the newest message, leaving the box empty.
    pub fn take(&self) -> Option<Message> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl PacketHandler for MessageBox {
    fn on_packet(&self, packet: &ReceivedPacket<'_>) {
        let feedback = match TextFeedback::decode(packet.payload) {
            Ok(feedback) => feedback,
            Err(e) => {
                warn!("MSGBOX | dropped id {}: {}", packet.packet_id.0, e);
                return;
            }
        };
        info!("MSGBOX | type={} | {}", feedback.kind, feedback.text);

        let mut text = String::new();
        // Decoded text is at most MAX_TEXT_LEN bytes.
        let _ = text.push_str(feedback.text);
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(Message {
            kind: feedback.kind,
            text,
        });
    }
}
