//! ACK-wait table and timeout sweep.
//!
//! Every acknowledged frame that reaches the wire parks its request here
//! until one of three things happens:
//!
//! ```text
//!   written ──▶ [slot] ──ACK frame──────────────▶ resolve()  → success
//!                 │
//!                 ├──timeout, retries left──▶ send queue (slot freed)
//!                 │        queue full ──▶ slot kept, next sweep
//!                 │
//!                 └──timeout, no retries──▶ sweep()  → DeliveryFailed
//! ```
//!
//! Completions are never invoked while the table lock is held; the
//! tracker hands finished requests back to the caller instead.

use std::sync::{Mutex, PoisonError};

use embassy_sync::channel::TrySendError;
use heapless::Vec;
use log::{debug, trace};

use super::channels::{SendQueue, SendRequest};
use super::codec::PacketId;

/// Concurrent acknowledged sends awaiting their ACK.
pub const ACK_SLOTS: usize = 8;

#[derive(Debug)]
struct AckEntry {
    packet_id: PacketId,
    sent_at_ms: u64,
    request: SendRequest,
}

impl AckEntry {
    fn expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.sent_at_ms) >= u64::from(self.request.ack_timeout_ms)
    }
}

/// Result of one sweep pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Retries pushed onto the send queue.
    pub requeued: usize,
    /// Expired entries kept because the send queue was full.
    pub deferred: usize,
    /// Requests out of retries; the caller completes them.
    pub failed: Vec<SendRequest, ACK_SLOTS>,
}

/// Fixed table of in-flight acknowledged sends.
#[derive(Debug)]
pub struct AckTracker {
    slots: Mutex<[Option<AckEntry>; ACK_SLOTS]>,
}

impl Default for AckTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AckTracker {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new([const { None }; ACK_SLOTS]),
        }
    }

    /// Park `request` until `packet_id` is acknowledged.
    ///
    /// Hands the request back when every slot is taken.
    pub fn register(
        &self,
        packet_id: PacketId,
        sent_at_ms: u64,
        request: SendRequest,
    ) -> Result<(), SendRequest> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = slots.iter_mut().find(|s| s.is_none()) else {
            return Err(request);
        };
        trace!("ack: waiting on id {}", packet_id.0);
        *slot = Some(AckEntry {
            packet_id,
            sent_at_ms,
            request,
        });
        Ok(())
    }

    /// Take the request waiting on `packet_id`, if any.
    pub fn resolve(&self, packet_id: PacketId) -> Option<SendRequest> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|e| e.packet_id == packet_id))?;
        slot.take().map(|entry| entry.request)
    }

    /// Expire entries older than their per-attempt timeout.
    ///
    /// Entries with retries left are re-queued as a fresh attempt; the slot
    /// is only freed once the queue accepts the retry.
    pub fn sweep(&self, now_ms: u64, queue: &SendQueue) -> SweepReport {
        let mut report = SweepReport::default();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        for slot in slots.iter_mut() {
            if !slot.as_ref().is_some_and(|e| e.expired(now_ms)) {
                continue;
            }
            let Some(AckEntry {
                packet_id,
                sent_at_ms,
                mut request,
            }) = slot.take()
            else {
                continue;
            };

            if request.retries_left == 0 {
                debug!("ack: id {} out of retries", packet_id.0);
                // At most ACK_SLOTS entries can fail in one pass.
                let _ = report.failed.push(request);
                continue;
            }

            request.retries_left -= 1;
            match queue.try_send(request) {
                Ok(()) => {
                    debug!("ack: id {} timed out, retrying", packet_id.0);
                    report.requeued += 1;
                }
                Err(TrySendError::Full(mut request)) => {
                    request.retries_left += 1;
                    *slot = Some(AckEntry {
                        packet_id,
                        sent_at_ms,
                        request,
                    });
                    report.deferred += 1;
                }
            }
        }
        report
    }

    /// Remove every entry. Used on shutdown.
    pub fn drain(&self) -> Vec<SendRequest, ACK_SLOTS> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut drained = Vec::new();
        for entry in slots.iter_mut().filter_map(Option::take) {
            let _ = drained.push(entry.request);
        }
        drained
    }

    /// Entries currently waiting for an ACK.
    pub fn in_flight(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.iter().filter(|s| s.is_some()).count()
    }
}

// ── Tests ────────────────────────────────────────────────────
