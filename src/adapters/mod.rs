//! Adapters: concrete implementations of the link's port traits.
//!
//! | Adapter    | Implements              | Connects to              |
//! |------------|-------------------------|--------------------------|
//! | `log_sink` | DiagnosticSink          | Serial log output        |
//! | `loopback` | SerialRead, SerialWrite | In-memory duplex line    |
//! | `time`     | Clock                   | ESP32 system timer       |
//! | `uart`     | SerialRead, SerialWrite | ESP32 UART (IDF driver)  |

pub mod log_sink;
pub mod loopback;
pub mod time;
#[cfg(target_os = "espidf")]
pub mod uart;
