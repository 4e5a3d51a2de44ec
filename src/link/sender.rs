//! Send worker: the single consumer of the send queue.
//!
//! ```text
//!   Queued ──▶ Framed ──▶ Written ─┬─ no ACK ─▶ Completed(Ok)
//!                                  │
//!                                  └─ ACK ────▶ AwaitingAck (AckTracker)
//! ```
//!
//! Every data frame goes out under the link's write lock, so frames from
//! this worker never interleave with ACK frames from the receive worker.
//! A fresh packet id is taken at write time, so each retry carries its
//! own id.

use std::sync::Arc;

use log::{debug, info, warn};

use super::channels::SendRequest;
use super::codec::encode_frame;
use super::transport::{Clock, SerialWrite};
use super::LinkShared;
use crate::error::LinkError;

/// Outcome of handling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendEvent {
    /// Written; unacked sends are complete.
    Sent,
    /// Written and parked in the ACK table.
    AwaitingAck,
    /// Completed with an error, no further attempts.
    Failed(LinkError),
}

pub struct SendPipeline<W, C> {
    shared: Arc<LinkShared<W, C>>,
}

impl<W: SerialWrite, C: Clock> SendPipeline<W, C> {
    pub(super) fn new(shared: Arc<LinkShared<W, C>>) -> Self {
        Self { shared }
    }

    /// Handle one queued request without blocking. `None` when the queue
    /// is empty.
    pub fn poll(&self) -> Option<SendEvent> {
        let request = self.shared.queue.try_receive().ok()?;
        Some(self.process(request))
    }

    /// Run until the link shuts down.
    pub fn run(&self) {
        info!("link: send worker started");
        futures_lite::future::block_on(async {
            loop {
                let next = futures_lite::future::or(
                    async { Some(self.shared.queue.receive().await) },
                    async {
                        self.shared.stop.wait().await;
                        None
                    },
                )
                .await;
                match next {
                    Some(request) => {
                        self.process(request);
                    }
                    None => break,
                }
            }
        });
        info!("link: send worker stopped");
    }

    fn process(&self, mut request: SendRequest) -> SendEvent {
        let shared = &self.shared;
        let packet_id = shared.next_packet_id();

        let frame = match encode_frame(request.selector, packet_id, request.payload.as_bytes()) {
            Ok(frame) => frame,
            Err(_) => {
                warn!("link: {}-byte payload does not fit a frame", request.payload.len());
                shared.stats.delivery_failed();
                request.complete(Err(LinkError::PayloadTooLarge));
                return SendEvent::Failed(LinkError::PayloadTooLarge);
            }
        };

        request.attempts = request.attempts.saturating_add(1);
        if request.attempts > 1 {
            shared.stats.retry();
        }
        let written = shared.write(frame.as_bytes());
        if written.is_ok() {
            shared.stats.frame_sent();
            debug!(
                "link: tx id {} sel {:#04x} ({} bytes, attempt {})",
                packet_id.0,
                request.selector.to_byte(),
                frame.len(),
                request.attempts
            );
        }

        if !request.selector.needs_ack {
            match written {
                Ok(()) => {
                    shared.stats.delivered();
                    request.complete(Ok(()));
                    return SendEvent::Sent;
                }
                Err(e) => {
                    shared.stats.delivery_failed();
                    request.complete(Err(e));
                    return SendEvent::Failed(e);
                }
            }
        }

        // A failed write still waits out its ACK window; the sweep turns
        // it into a retry like any lost frame.
        let sent_at = shared.clock.now_ms();
        match shared.acks.register(packet_id, sent_at, request) {
            Ok(()) if shared.is_stopped() => {
                // Shutdown may have drained the table before this entry
                // landed; whichever side takes it completes it.
                if let Some(request) = shared.acks.resolve(packet_id) {
                    request.complete(Err(LinkError::Stopped));
                }
                SendEvent::Failed(LinkError::Stopped)
            }
            Ok(()) => SendEvent::AwaitingAck,
            Err(request) => {
                warn!("link: ACK table full, dropping id {}", packet_id.0);
                shared.stats.rejected();
                shared.stats.delivery_failed();
                request.complete(Err(LinkError::AckTableFull));
                SendEvent::Failed(LinkError::AckTableFull)
            }
        }
    }
}
