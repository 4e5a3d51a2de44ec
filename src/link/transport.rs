//! Serial transport and clock abstractions.
//!
//! Concrete implementations:
//! - UART on the ESP32-S3 (`adapters::uart`)
//! - In-memory duplex line for host simulation (`adapters::loopback`)
//!
//! The link is generic over these traits, so it neither knows nor cares
//! whether bytes come from a UART FIFO or a DMA ring buffer.

use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receive half of a byte-oriented serial channel.
pub trait SerialRead: Send {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read into `buf` until it is full or `timeout` elapses.
    ///
    /// Returns the number of bytes read; fewer than `buf.len()` means the
    /// timeout expired (0 = nothing arrived).
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error>;
}

/// Transmit half of a byte-oriented serial channel.
///
/// The link serialises all calls behind its own write lock, so one call
/// always puts one complete frame on the wire.
pub trait SerialWrite: Send {
    type Error: core::fmt::Debug;

    /// Queue all of `data` for transmission.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// A null port that discards all writes and never reads anything.
/// Useful as a placeholder when no receiver is attached.
pub struct NullPort;

impl SerialRead for NullPort {
    type Error = ();

    fn read(&mut self, _buf: &mut [u8], timeout: Duration) -> Result<usize, ()> {
        std::thread::sleep(timeout);
        Ok(0)
    }
}

impl SerialWrite for NullPort {
    type Error = ();

    fn write(&mut self, _data: &[u8]) -> Result<(), ()> {
        Ok(())
    }
}

/// Clock that only moves when told to. For deterministic tests and
/// simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::AcqRel);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
