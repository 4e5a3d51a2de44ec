//! In-memory duplex serial line for host simulation.
//!
//! ```text
//!   end A.writer ──▶ [ line A→B ] ──▶ end B.reader
//!   end A.reader ◀── [ line B→A ] ◀── end B.writer
//! ```
//!
//! Reads block on a condition variable with the same fill-or-timeout
//! semantics as the UART driver, so the link's receive timing behaves
//! the same as on hardware. Writers are cloneable, which lets tests inject
//! raw bytes alongside a running link.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::link::transport::{SerialRead, SerialWrite};

#[derive(Default)]
struct Line {
    bytes: Mutex<VecDeque<u8>>,
    ready: Condvar,
}

impl Line {
    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receive half of one end.
pub struct LineReader {
    line: Arc<Line>,
}

impl LineReader {
    /// Bytes waiting to be read.
    pub fn pending(&self) -> usize {
        self.line.lock().len()
    }
}

impl SerialRead for LineReader {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;
        let mut bytes = self.line.lock();
        loop {
            while filled < buf.len() {
                match bytes.pop_front() {
                    Some(b) => {
                        buf[filled] = b;
                        filled += 1;
                    }
                    None => break,
                }
            }
            if filled == buf.len() {
                return Ok(filled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(filled);
            }
            bytes = self
                .line
                .ready
                .wait_timeout(bytes, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Transmit half of one end. Clones write to the same line.
#[derive(Clone)]
pub struct LineWriter {
    line: Arc<Line>,
}

impl SerialWrite for LineWriter {
    type Error = core::convert::Infallible;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.line.lock().extend(data.iter().copied());
        self.line.ready.notify_all();
        Ok(())
    }
}

/// One end of the line.
pub struct Endpoint {
    pub reader: LineReader,
    pub writer: LineWriter,
}

/// Two connected ends: whatever one writes, the other reads.
pub fn serial_pair() -> (Endpoint, Endpoint) {
    let a_to_b = Arc::new(Line::default());
    let b_to_a = Arc::new(Line::default());
    let a = Endpoint {
        reader: LineReader {
            line: Arc::clone(&b_to_a),
        },
        writer: LineWriter {
            line: Arc::clone(&a_to_b),
        },
    };
    let b = Endpoint {
        reader: LineReader { line: a_to_b },
        writer: LineWriter { line: b_to_a },
    };
    (a, b)
}
