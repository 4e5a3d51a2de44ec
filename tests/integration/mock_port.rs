//! Mock serial ports for integration tests.
//!
//! Records every write so tests can assert on the exact frames put on
//! the wire, and replays scripted input without real timing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use handset::config::LinkConfig;
use handset::diagnostics::{DiagnosticSink, LinkFault};
use handset::link::Link;
use handset::link::codec::{ACK_HEAD, FRAME_HEAD, decode_ack, decode_frame};
use handset::link::transport::{ManualClock, SerialRead, SerialWrite};

// ── RecordingWriter ───────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingWriter {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    fail: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write call, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    /// Data frames written.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|w| w.first() == Some(&FRAME_HEAD))
            .collect()
    }

    /// ACK frames written.
    pub fn acks(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|w| w.first() == Some(&ACK_HEAD))
            .collect()
    }

    /// Packet id of the most recent data frame.
    pub fn last_frame_id(&self) -> u32 {
        let frames = self.frames();
        let last = frames.last().expect("no frame written");
        decode_frame(last).expect("recorded frame is valid").packet_id.0
    }

    pub fn last_ack_id(&self) -> u32 {
        let acks = self.acks();
        decode_ack(acks.last().expect("no ack written")).unwrap().0
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl SerialWrite for RecordingWriter {
    type Error = &'static str;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail.load(Ordering::Relaxed) {
            return Err("line down");
        }
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }
}

// ── ScriptedReader ────────────────────────────────────────────

/// Hands out queued bytes immediately; a read that runs dry returns
/// short, as if the timeout had expired.
#[derive(Clone, Default)]
pub struct ScriptedReader {
    input: Arc<Mutex<VecDeque<u8>>>,
}

#[allow(dead_code)]
impl ScriptedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, bytes: &[u8]) {
        self.input.lock().unwrap().extend(bytes.iter().copied());
    }

    pub fn remaining(&self) -> usize {
        self.input.lock().unwrap().len()
    }
}

impl SerialRead for ScriptedReader {
    type Error = ();

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, ()> {
        let mut input = self.input.lock().unwrap();
        let mut n = 0;
        while n < buf.len() {
            match input.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

// ── RecordingDiagnostics ──────────────────────────────────────

#[derive(Default)]
pub struct RecordingDiagnostics {
    pub faults: Mutex<Vec<LinkFault>>,
}

#[allow(dead_code)]
impl RecordingDiagnostics {
    pub fn faults(&self) -> Vec<LinkFault> {
        self.faults.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn report(&self, fault: LinkFault) {
        self.faults.lock().unwrap().push(fault);
    }
}

// ── Fixture ───────────────────────────────────────────────────

pub struct Harness {
    pub link: Link<RecordingWriter, Arc<ManualClock>>,
    pub wire: RecordingWriter,
    pub input: ScriptedReader,
    pub clock: Arc<ManualClock>,
    pub diagnostics: Arc<RecordingDiagnostics>,
}

pub fn harness() -> Harness {
    let wire = RecordingWriter::new();
    let clock = Arc::new(ManualClock::new(1_000));
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let link = Link::new(
        wire.clone(),
        Arc::clone(&clock),
        LinkConfig::default(),
        diagnostics.clone(),
    )
    .unwrap();
    Harness {
        link,
        wire,
        input: ScriptedReader::new(),
        clock,
        diagnostics,
    }
}
