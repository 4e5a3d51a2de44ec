//! Handset Firmware: Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  UART1 (GPIO17 TX / GPIO18 RX, 115200 8N1)                   │
//! │        │                              ▲                      │
//! │        ▼                              │                      │
//! │  link-rx ──▶ MessageBox        link-tx ◀── ControlLoop (50 Hz)│
//! │     │                             ▲                          │
//! │     └──── ACK ──▶ link-ack sweep ─┘ (retries)                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::UartDriver;
use log::info;

use handset::adapters::log_sink::LogDiagnostics;
use handset::adapters::time::MonotonicClock;
use handset::adapters::uart;
use handset::config::LinkConfig;
use handset::link::Link;
use handset::link::selector::PacketKind;
use handset::remote::control::AXIS_COUNT;
use handset::remote::control_loop::{ControlLoop, InputSource, RawInput};
use handset::remote::feedback::MessageBox;

/// Neutral sticks, no keys. Stands in until the board layer supplies
/// ADC and shift-register samples.
struct NeutralInput;

impl InputSource for NeutralInput {
    fn sample(&mut self) -> RawInput {
        RawInput {
            axes: [0x7FF; AXIS_COUNT],
            keys: 0,
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Handset v{}                          ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = LinkConfig::default();

    // ── 2. UART ───────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let driver = UartDriver::new(
        peripherals.uart1,
        peripherals.pins.gpio17,
        peripherals.pins.gpio18,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart::link_uart_config(config.baud_rate),
    )?;
    let (reader, writer) = uart::split(driver);

    // ── 3. Link ───────────────────────────────────────────────
    let diagnostics = Arc::new(LogDiagnostics::new());
    let link = Link::new(writer, MonotonicClock::new(), config, diagnostics)?;

    let message_box = Arc::new(MessageBox::new());
    link.register(PacketKind::ReceiverMessageBox, message_box)?;

    let _workers = link.start(reader)?;

    // ── 4. Control loop (runs on the main task) ───────────────
    let mut control = ControlLoop::new(link.clone(), NeutralInput);
    control.run();

    info!("Link stats: {:?}", link.stats());
    Ok(())
}
