//! Remote-control payload: stick axes plus key bitmap.
//!
//! Wire layout (packed, little-endian, 20 bytes):
//! ```text
//! ┌────────┬────────┬────────┬────────┬──────────┐
//! │ axis 0 │ axis 1 │ axis 2 │ axis 3 │ keys u32 │
//! │  f32   │  f32   │  f32   │  f32   │          │
//! └────────┴────────┴────────┴────────┴──────────┘
//! ```
//! Axes are normalised to `-1.0..=1.0`; 0 inside the dead zone.

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Key bits reported by the shift-register button scan.
pub mod keys {
    pub const RIGHT_SWITCH_UP: u32 = 0x0002;
    pub const RIGHT_SWITCH_DOWN: u32 = 0x0004;
    pub const RIGHT_KEY_UP: u32 = 0x0008;
    pub const RIGHT_KEY_LEFT: u32 = 0x0010;
    pub const RIGHT_KEY_RIGHT: u32 = 0x0020;
    pub const RIGHT_KEY_DOWN: u32 = 0x0040;
    pub const LEFT_BROADSIDE_KEY: u32 = 0x0080;
    pub const RIGHT_BROADSIDE_KEY: u32 = 0x0100;
    pub const LEFT_SWITCH_DOWN: u32 = 0x0200;
    pub const LEFT_SWITCH_UP: u32 = 0x0400;
    pub const LEFT_KEY_DOWN: u32 = 0x0800;
    pub const LEFT_KEY_LEFT: u32 = 0x1000;
    pub const LEFT_KEY_RIGHT: u32 = 0x2000;
    pub const LEFT_KEY_UP: u32 = 0x4000;
}

/// Stick axes: left X, left Y, right X, right Y.
pub const AXIS_COUNT: usize = 4;

/// Encoded [`ControlPacket`] size.
pub const CONTROL_PACKET_LEN: usize = AXIS_COUNT * 4 + 4;

/// Mid-scale of the 12-bit stick ADC.
pub const ADC_CENTER: i32 = 0x7FF;

/// Per-axis trim applied before normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisCalibration {
    /// Added to the raw ADC reading.
    pub offset: i16,
    /// Half-width of the zero band around centre, in ADC counts.
    pub dead_zone: u16,
}

/// Factory trim of the handset sticks.
pub const DEFAULT_CALIBRATION: [AxisCalibration; AXIS_COUNT] = [
    AxisCalibration { offset: -20, dead_zone: 80 },
    AxisCalibration { offset: -90, dead_zone: 80 },
    AxisCalibration { offset: 100, dead_zone: 80 },
    AxisCalibration { offset: -10, dead_zone: 80 },
];

/// Map a raw 12-bit reading onto `-1.0..=1.0`.
pub fn normalize_stick(raw: u16, cal: AxisCalibration) -> f32 {
    let v = i32::from(raw) + i32::from(cal.offset);
    let dead = i32::from(cal.dead_zone);
    if v < ADC_CENTER + dead && v > ADC_CENTER - dead {
        return 0.0;
    }

    let k = 1.0 / (ADC_CENTER - 2 * dead).max(1) as f32;
    let out = if v > ADC_CENTER {
        (v - ADC_CENTER - dead) as f32 * k
    } else {
        (v - ADC_CENTER + dead) as f32 * k
    };
    out.clamp(-1.0, 1.0)
}

/// One control update sent to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlPacket {
    pub axes: [f32; AXIS_COUNT],
    pub keys: u32,
}

impl ControlPacket {
    /// Normalise raw ADC readings with per-axis calibration.
    pub fn from_raw(
        raw_axes: [u16; AXIS_COUNT],
        keys: u32,
        calibration: &[AxisCalibration; AXIS_COUNT],
    ) -> Self {
        let mut axes = [0.0; AXIS_COUNT];
        for ((axis, raw), cal) in axes.iter_mut().zip(raw_axes).zip(calibration) {
            *axis = normalize_stick(raw, *cal);
        }
        Self { axes, keys }
    }

    pub fn is_pressed(&self, key: u32) -> bool {
        self.keys & key != 0
    }

    pub fn encode(&self) -> [u8; CONTROL_PACKET_LEN] {
        let mut out = [0u8; CONTROL_PACKET_LEN];
        for (chunk, axis) in out.chunks_exact_mut(4).zip(self.axes) {
            chunk.copy_from_slice(&axis.to_le_bytes());
        }
        out[AXIS_COUNT * 4..].copy_from_slice(&self.keys.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let bytes = bytes
            .get(..CONTROL_PACKET_LEN)
            .ok_or(PayloadError::Truncated)?;
        let word = |i: usize| [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]];

        let mut axes = [0.0; AXIS_COUNT];
        for (n, axis) in axes.iter_mut().enumerate() {
            *axis = f32::from_le_bytes(word(n * 4));
        }
        Ok(Self {
            axes,
            keys: u32::from_le_bytes(word(AXIS_COUNT * 4)),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────
