//! Link fault reporting and runtime counters.
//!
//! Malformed input never propagates as an error: the receive worker
//! reports it to a [`DiagnosticSink`] and resynchronises on the next
//! byte. [`LinkStats`] counts traffic and faults with relaxed atomics so
//! any thread can read a consistent-enough snapshot for telemetry.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Malformed-input categories seen by the receive worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkFault {
    /// Byte that is neither a frame nor an ACK marker.
    BadHead,
    /// Frame checksum mismatch.
    BadChecksum,
    /// Declared length out of range, or the frame body timed out.
    BadLength,
    /// ACK marker not followed by four id bytes in time.
    BadAck,
}

impl LinkFault {
    /// Map a decode error onto its diagnostic category.
    pub fn from_frame_error(err: FrameError) -> Self {
        match err {
            FrameError::BadHead => Self::BadHead,
            FrameError::BadChecksum => Self::BadChecksum,
            FrameError::BadAck => Self::BadAck,
            FrameError::BadLength | FrameError::ShortRead | FrameError::TooLarge => {
                Self::BadLength
            }
        }
    }
}

impl core::fmt::Display for LinkFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadHead => write!(f, "bad head"),
            Self::BadChecksum => write!(f, "bad checksum"),
            Self::BadLength => write!(f, "bad length"),
            Self::BadAck => write!(f, "bad ack"),
        }
    }
}

/// Observer for malformed input. Observability only; must not block.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, fault: LinkFault);
}

/// Sink that drops every report.
pub struct NoDiagnostics;

impl DiagnosticSink for NoDiagnostics {
    fn report(&self, _fault: LinkFault) {}
}

// ── Counters ─────────────────────────────────────────────────

/// Traffic and fault counters for one link.
#[derive(Debug, Default)]
pub struct LinkStats {
    frames_tx: AtomicU32,
    frames_rx: AtomicU32,
    acks_tx: AtomicU32,
    acks_rx: AtomicU32,
    retries: AtomicU32,
    delivered: AtomicU32,
    delivery_failures: AtomicU32,
    rejected: AtomicU32,
    write_errors: AtomicU32,
    bad_head: AtomicU32,
    bad_checksum: AtomicU32,
    bad_length: AtomicU32,
    bad_ack: AtomicU32,
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_tx: u32,
    pub frames_rx: u32,
    pub acks_tx: u32,
    pub acks_rx: u32,
    pub retries: u32,
    pub delivered: u32,
    pub delivery_failures: u32,
    pub rejected: u32,
    pub write_errors: u32,
    pub bad_head: u32,
    pub bad_checksum: u32,
    pub bad_length: u32,
    pub bad_ack: u32,
}

impl StatsSnapshot {
    pub fn faults(&self) -> u32 {
        self.bad_head + self.bad_checksum + self.bad_length + self.bad_ack
    }
}

fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_sent(&self) {
        bump(&self.frames_tx);
    }

    pub fn frame_received(&self) {
        bump(&self.frames_rx);
    }

    pub fn ack_sent(&self) {
        bump(&self.acks_tx);
    }

    pub fn ack_received(&self) {
        bump(&self.acks_rx);
    }

    pub fn retry(&self) {
        bump(&self.retries);
    }

    pub fn delivered(&self) {
        bump(&self.delivered);
    }

    pub fn delivery_failed(&self) {
        bump(&self.delivery_failures);
    }

    /// Submission refused for capacity (queue, ACK table, waiters).
    pub fn rejected(&self) {
        bump(&self.rejected);
    }

    pub fn write_error(&self) {
        bump(&self.write_errors);
    }

    pub fn fault(&self, fault: LinkFault) {
        match fault {
            LinkFault::BadHead => bump(&self.bad_head),
            LinkFault::BadChecksum => bump(&self.bad_checksum),
            LinkFault::BadLength => bump(&self.bad_length),
            LinkFault::BadAck => bump(&self.bad_ack),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU32| c.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_tx: load(&self.frames_tx),
            frames_rx: load(&self.frames_rx),
            acks_tx: load(&self.acks_tx),
            acks_rx: load(&self.acks_rx),
            retries: load(&self.retries),
            delivered: load(&self.delivered),
            delivery_failures: load(&self.delivery_failures),
            rejected: load(&self.rejected),
            write_errors: load(&self.write_errors),
            bad_head: load(&self.bad_head),
            bad_checksum: load(&self.bad_checksum),
            bad_length: load(&self.bad_length),
            bad_ack: load(&self.bad_ack),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
