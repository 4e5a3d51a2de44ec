//! Periodic ACK timeout sweep.
//!
//! Runs on a fixed period (4 ms by default) against an absolute
//! schedule, so a slow pass shortens the next sleep instead of pushing
//! every later pass back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use super::LinkShared;
use super::transport::{Clock, SerialWrite};
use crate::error::LinkError;

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub requeued: usize,
    pub deferred: usize,
    pub failed: usize,
}

pub struct AckSweeper<W, C> {
    shared: Arc<LinkShared<W, C>>,
}

impl<W: SerialWrite, C: Clock> AckSweeper<W, C> {
    pub(super) fn new(shared: Arc<LinkShared<W, C>>) -> Self {
        Self { shared }
    }

    /// One pass over the ACK table at the clock's current time.
    pub fn sweep_once(&self) -> SweepSummary {
        let shared = &self.shared;
        let now = shared.clock.now_ms();
        let report = shared.acks.sweep(now, &shared.queue);

        if report.deferred > 0 {
            warn!("link: send queue full, {} retries deferred", report.deferred);
        }
        let failed = report.failed.len();
        for request in report.failed {
            warn!(
                "link: delivery failed after {} attempts (sel {:#04x})",
                request.attempts,
                request.selector.to_byte()
            );
            shared.stats.delivery_failed();
            request.complete(Err(LinkError::DeliveryFailed));
        }

        SweepSummary {
            requeued: report.requeued,
            deferred: report.deferred,
            failed,
        }
    }

    /// Run until the link shuts down.
    pub fn run(&self) {
        let period = Duration::from_millis(u64::from(self.shared.config.sweep_period_ms));
        info!("link: ack sweep started ({} ms)", period.as_millis());

        let mut next = Instant::now();
        while !self.shared.is_stopped() {
            self.sweep_once();
            next += period;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                // Fell behind; restart the schedule from here.
                next = now;
            }
        }
        info!("link: ack sweep stopped");
    }
}
