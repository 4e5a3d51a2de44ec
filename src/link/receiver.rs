//! Receive worker: byte-stream scanner, auto-ACK and dispatch.
//!
//! ```text
//!  read 1 byte (idle poll)
//!     │
//!     ├─ 0xAA ─▶ 4 id bytes ──▶ AckTracker::resolve ──▶ completion(Ok)
//!     │            (short: BadAck)
//!     │
//!     ├─ 0x5A ─▶ len ─▶ selector+id ─▶ payload+sum ─▶ checksum
//!     │            (any failure: fault, rescan from next byte)
//!     │                                     │
//!     │                  needs ACK? write [0xAA id] under write lock
//!     │                                     │
//!     │                         CallbackRegistry::dispatch
//!     │
//!     └─ other ─▶ BadHead
//! ```
//!
//! Payload slices handed to handlers point into the single receive
//! buffer and are only valid for the duration of the call.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};

use super::codec::{
    check_length, decode_frame, encode_ack, PacketId, ACK_HEAD, FRAME_HEAD, HEADER_LEN,
    MAX_FRAME_LEN,
};
use super::registry::ReceivedPacket;
use super::selector::Selector;
use super::transport::{Clock, SerialRead, SerialWrite};
use super::LinkShared;
use crate::diagnostics::LinkFault;

/// What one scan step consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    /// Nothing arrived within the idle poll window.
    Idle,
    /// Valid data frame; `handlers` bindings were called.
    Frame {
        selector: Selector,
        packet_id: PacketId,
        handlers: usize,
    },
    /// ACK frame; `matched` when an in-flight send was waiting on it.
    Ack { packet_id: PacketId, matched: bool },
    /// Malformed input, reported to diagnostics.
    Fault(LinkFault),
}

pub struct ReceivePipeline<R, W, C> {
    shared: Arc<LinkShared<W, C>>,
    reader: R,
    buf: [u8; MAX_FRAME_LEN],
}

impl<R: SerialRead, W: SerialWrite, C: Clock> ReceivePipeline<R, W, C> {
    pub(super) fn new(shared: Arc<LinkShared<W, C>>, reader: R) -> Self {
        Self {
            shared,
            reader,
            buf: [0; MAX_FRAME_LEN],
        }
    }

    /// Run until the link shuts down.
    pub fn run(&mut self) {
        info!("link: receive worker started");
        while !self.shared.is_stopped() {
            self.step();
        }
        info!("link: receive worker stopped");
    }

    /// Consume one marker byte and whatever follows it.
    pub fn step(&mut self) -> RxEvent {
        let idle = Duration::from_millis(u64::from(self.shared.config.idle_poll_ms));
        if !self.fill(0, 1, idle) {
            return RxEvent::Idle;
        }

        let event = match self.buf[0] {
            ACK_HEAD => self.read_ack(),
            FRAME_HEAD => self.read_frame(),
            other => {
                trace!("link: stray byte {:#04x}", other);
                RxEvent::Fault(LinkFault::BadHead)
            }
        };
        if let RxEvent::Fault(fault) = event {
            self.shared.fault(fault);
        }
        event
    }

    fn field_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.shared.config.field_timeout_ms))
    }

    /// Fill `buf[start..end]` within `timeout`. False on a short read.
    fn fill(&mut self, start: usize, end: usize, timeout: Duration) -> bool {
        match self.reader.read(&mut self.buf[start..end], timeout) {
            Ok(n) => n == end - start,
            Err(e) => {
                warn!("link: serial read failed: {:?}", e);
                std::thread::sleep(timeout);
                false
            }
        }
    }

    fn read_ack(&mut self) -> RxEvent {
        let timeout = self.field_timeout();
        if !self.fill(1, 5, timeout) {
            return RxEvent::Fault(LinkFault::BadAck);
        }
        let packet_id = PacketId::from_le_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
        self.shared.stats.ack_received();

        let matched = match self.shared.acks.resolve(packet_id) {
            Some(request) => {
                debug!("link: ack id {} (attempt {})", packet_id.0, request.attempts);
                self.shared.stats.delivered();
                request.complete(Ok(()));
                true
            }
            None => {
                debug!("link: ack id {} matches nothing in flight", packet_id.0);
                false
            }
        };
        RxEvent::Ack { packet_id, matched }
    }

    fn read_frame(&mut self) -> RxEvent {
        let field = self.field_timeout();
        if !self.fill(1, 2, field) {
            return RxEvent::Fault(LinkFault::BadLength);
        }
        let Ok(len) = check_length(self.buf[1]) else {
            return RxEvent::Fault(LinkFault::BadLength);
        };
        if !self.fill(2, HEADER_LEN, field) {
            return RxEvent::Fault(LinkFault::BadLength);
        }
        let body = Duration::from_millis(u64::from(self.shared.config.payload_timeout_ms));
        if !self.fill(HEADER_LEN, len, body) {
            return RxEvent::Fault(LinkFault::BadLength);
        }

        let view = match decode_frame(&self.buf[..len]) {
            Ok(view) => view,
            Err(e) => return RxEvent::Fault(LinkFault::from_frame_error(e)),
        };
        let shared = &self.shared;
        shared.stats.frame_received();
        trace!(
            "link: rx id {} sel {:#04x} ({} bytes)",
            view.packet_id.0,
            view.selector.to_byte(),
            len
        );

        if view.selector.needs_ack {
            match shared.write(&encode_ack(view.packet_id)) {
                Ok(()) => shared.stats.ack_sent(),
                Err(_) => warn!("link: failed to ack id {}", view.packet_id.0),
            }
        }

        let handlers = shared.registry.dispatch(&ReceivedPacket {
            selector: view.selector,
            packet_id: view.packet_id,
            payload: view.payload,
        });
        RxEvent::Frame {
            selector: view.selector,
            packet_id: view.packet_id,
            handlers,
        }
    }
}
