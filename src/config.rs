//! Link configuration parameters
//!
//! Timing and retry defaults for the serial link and the control loop.
//! Values can be persisted with postcard or provisioned as JSON.
//! Table capacities are compile-time constants in their modules.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::link::channels::RetryPolicy;

/// Serial link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    // --- UART ---
    /// Line rate (8N1)
    pub baud_rate: u32,

    // --- Receive timing ---
    /// Timeout for each header field after the marker byte (ms)
    pub field_timeout_ms: u32,
    /// Timeout for payload + checksum once the length is known (ms)
    pub payload_timeout_ms: u32,
    /// How long the receive worker waits for a marker before checking for
    /// shutdown (ms)
    pub idle_poll_ms: u32,

    // --- Acknowledgment ---
    /// ACK sweep period (ms)
    pub sweep_period_ms: u32,
    /// Per-attempt ACK timeout used when the caller gives none (ms)
    pub ack_timeout_ms: u32,
    /// Retries used when the caller gives none
    pub max_retries: u8,

    // --- Control ---
    /// Control packet period (ms)
    pub control_period_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,

            field_timeout_ms: 20,
            payload_timeout_ms: 50,
            idle_poll_ms: 100,

            sweep_period_ms: 4,
            ack_timeout_ms: 50,
            max_retries: 3,

            control_period_ms: 20, // 50 Hz
        }
    }
}

impl LinkConfig {
    /// Reject values the link cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationFailed("baud_rate"));
        }
        if self.field_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("field_timeout_ms"));
        }
        if self.payload_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("payload_timeout_ms"));
        }
        if self.idle_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed("idle_poll_ms"));
        }
        if self.sweep_period_ms == 0 {
            return Err(ConfigError::ValidationFailed("sweep_period_ms"));
        }
        // An ACK timeout shorter than one sweep can never be honoured.
        if self.ack_timeout_ms < self.sweep_period_ms {
            return Err(ConfigError::ValidationFailed("ack_timeout_ms"));
        }
        if self.control_period_ms == 0 {
            return Err(ConfigError::ValidationFailed("control_period_ms"));
        }
        Ok(())
    }

    /// Retry policy built from the defaults.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.ack_timeout_ms)
    }

    /// Encode for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Encode)
    }

    /// Decode and validate a persisted configuration.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }

    /// Decode and validate a JSON provisioning document. Missing fields
    /// take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }
}
