//! Send requests, completion reporting and the bounded send channel.
//!
//! Uses an `embassy-sync` bounded channel so application threads and the
//! ACK sweep can hand requests to the send worker without heap
//! allocation. Submission is always `try_send`: a full channel is an
//! immediate failure, never a blocked caller.
//!
//! ```text
//! ┌──────────────┐              ┌──────────────┐
//! │ Application  │──┐           │              │
//! └──────────────┘  │ SendReq   │  Send worker │──▶ serial TX
//! ┌──────────────┐  ├─────────▶│  (consumer)  │
//! │  ACK sweep   │──┘ (retry)   │              │
//! └──────────────┘              └──────────────┘
//! ```

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use super::payload::Payload;
use super::selector::Selector;
use crate::error::LinkError;

/// Send channel depth.
pub const SEND_QUEUE_DEPTH: usize = 8;

/// Bounded send channel: application + ACK sweep → send worker.
pub type SendQueue = Channel<CriticalSectionRawMutex, SendRequest, SEND_QUEUE_DEPTH>;

/// Retry budget and per-attempt ACK timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retransmissions after the first attempt.
    pub retries: u8,
    /// How long each attempt waits for its ACK.
    pub ack_timeout_ms: u32,
}

impl RetryPolicy {
    pub const fn new(retries: u8, ack_timeout_ms: u32) -> Self {
        Self {
            retries,
            ack_timeout_ms,
        }
    }

    /// Worst case from first write to final failure, excluding sweep jitter.
    pub const fn total_window_ms(&self) -> u64 {
        (self.retries as u64 + 1) * self.ack_timeout_ms as u64
    }
}

/// Final result of a send, handed back together with the payload.
#[derive(Debug)]
pub struct DeliveryReport {
    pub selector: Selector,
    /// `Ok` once written (unacked) or acknowledged (acked).
    pub outcome: Result<(), LinkError>,
    /// Physical write attempts made.
    pub attempts: u8,
    pub payload: Payload,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Receives completion reports.
///
/// Called from link worker threads (send worker, receive worker or ACK
/// sweep). Must not block.
pub trait DeliveryObserver: Send + Sync {
    fn on_delivery(&self, token: u64, report: DeliveryReport);
}

impl<F> DeliveryObserver for F
where
    F: Fn(u64, DeliveryReport) + Send + Sync,
{
    fn on_delivery(&self, token: u64, report: DeliveryReport) {
        self(token, report);
    }
}

/// Observer plus the caller's opaque context token.
#[derive(Clone)]
pub struct Completion {
    observer: Arc<dyn DeliveryObserver>,
    token: u64,
}

impl Completion {
    pub fn new(observer: Arc<dyn DeliveryObserver>, token: u64) -> Self {
        Self { observer, token }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn notify(self, report: DeliveryReport) {
        self.observer.on_delivery(self.token, report);
    }
}

impl core::fmt::Debug for Completion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completion").field("token", &self.token).finish()
    }
}

/// One queued transmission.
#[derive(Debug)]
pub struct SendRequest {
    pub selector: Selector,
    pub payload: Payload,
    /// Retries still allowed after this attempt.
    pub retries_left: u8,
    pub ack_timeout_ms: u32,
    pub completion: Option<Completion>,
    /// Attempts already written before this one.
    pub attempts: u8,
}

impl SendRequest {
    /// Fire-and-forget request.
    pub fn unacked(selector: Selector, payload: Payload) -> Self {
        Self {
            selector: Selector { needs_ack: false, ..selector },
            payload,
            retries_left: 0,
            ack_timeout_ms: 0,
            completion: None,
            attempts: 0,
        }
    }

    /// Request that waits for an ACK, retrying per `policy`.
    pub fn acked(
        selector: Selector,
        payload: Payload,
        policy: RetryPolicy,
        completion: Option<Completion>,
    ) -> Self {
        Self {
            selector: Selector { needs_ack: true, ..selector },
            payload,
            retries_left: policy.retries,
            ack_timeout_ms: policy.ack_timeout_ms,
            completion,
            attempts: 0,
        }
    }

    /// Report the final outcome, handing the payload back.
    pub fn complete(self, outcome: Result<(), LinkError>) {
        if let Some(completion) = self.completion {
            completion.notify(DeliveryReport {
                selector: self.selector,
                outcome,
                attempts: self.attempts,
                payload: self.payload,
            });
        }
    }
}

/// Rejected submission; the payload is handed back untouched.
#[derive(Debug)]
pub struct SubmitError {
    pub reason: LinkError,
    pub payload: Payload,
}

impl core::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "send rejected: {}", self.reason)
    }
}

impl std::error::Error for SubmitError {}

impl From<SubmitError> for crate::error::Error {
    fn from(e: SubmitError) -> Self {
        Self::Link(e.reason)
    }
}
