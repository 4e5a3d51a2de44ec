//! Periodic control update: sample inputs, normalise, send.
//!
//! Runs at the configured control period (20 ms = 50 Hz) on an absolute
//! schedule. Updates are fire-and-forget: a newer sample supersedes any
//! lost one, so a full send queue only skips a tick.

use std::time::{Duration, Instant};

use log::{debug, info};

use super::control::{AXIS_COUNT, AxisCalibration, ControlPacket, DEFAULT_CALIBRATION};
use crate::error::LinkError;
use crate::link::Link;
use crate::link::payload::Payload;
use crate::link::selector::PacketKind;
use crate::link::transport::{Clock, SerialWrite};

/// One raw input sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawInput {
    /// 12-bit ADC readings: left X, left Y, right X, right Y.
    pub axes: [u16; AXIS_COUNT],
    /// Button bitmap, see [`keys`](super::control::keys).
    pub keys: u16,
}

/// Source of stick and button samples (ADC + shift register on the
/// device, scripted in tests).
pub trait InputSource: Send {
    fn sample(&mut self) -> RawInput;
}

pub struct ControlLoop<I, W, C> {
    link: Link<W, C>,
    input: I,
    calibration: [AxisCalibration; AXIS_COUNT],
    period: Duration,
    skipped: u32,
}

impl<I: InputSource, W: SerialWrite, C: Clock> ControlLoop<I, W, C> {
    pub fn new(link: Link<W, C>, input: I) -> Self {
        let period = Duration::from_millis(u64::from(link.config().control_period_ms));
        Self {
            link,
            input,
            calibration: DEFAULT_CALIBRATION,
            period,
            skipped: 0,
        }
    }

    pub fn with_calibration(mut self, calibration: [AxisCalibration; AXIS_COUNT]) -> Self {
        self.calibration = calibration;
        self
    }

    /// Ticks dropped because the send queue was full.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Sample once and queue the update.
    pub fn tick(&mut self) -> Result<ControlPacket, LinkError> {
        let raw = self.input.sample();
        let packet = ControlPacket::from_raw(raw.axes, u32::from(raw.keys), &self.calibration);
        let payload = Payload::copy_from(&packet.encode())?;
        match self.link.send_unacked(PacketKind::RemoteControl, payload) {
            Ok(()) => Ok(packet),
            Err(e) => {
                self.skipped += 1;
                Err(e.reason)
            }
        }
    }

    /// Run until the link shuts down.
    pub fn run(&mut self) {
        info!("control: {} ms period", self.period.as_millis());
        let mut next = Instant::now();
        while !self.link.is_stopped() {
            if let Err(e) = self.tick() {
                debug!("control: tick skipped ({})", e);
            }
            next += self.period;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                next = now;
            }
        }
        info!("control: stopped after {} skipped ticks", self.skipped);
    }
}
