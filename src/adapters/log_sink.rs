//! Log-based diagnostic sink adapter.
//!
//! Implements [`DiagnosticSink`] by writing each link fault to the
//! ESP-IDF logger (UART / USB-CDC in production) and keeping a running
//! count for telemetry.

use std::sync::atomic::{AtomicU32, Ordering};

use log::warn;

use crate::diagnostics::{DiagnosticSink, LinkFault};

/// Adapter that logs every [`LinkFault`] to the serial console.
#[derive(Debug, Default)]
pub struct LogDiagnostics {
    reported: AtomicU32,
}

impl LogDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faults reported since construction.
    pub fn reported(&self) -> u32 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl DiagnosticSink for LogDiagnostics {
    fn report(&self, fault: LinkFault) {
        let total = self.reported.fetch_add(1, Ordering::Relaxed) + 1;
        warn!("LINK | {} | total={}", fault, total);
    }
}
