//! UART transport adapter (ESP-IDF only).
//!
//! Splits an `esp-idf-hal` [`UartDriver`] into owned receive and transmit
//! halves so the receive worker and the link's write lock never contend
//! for the same driver handle.

use core::time::Duration;

use esp_idf_hal::delay::TickType;
use esp_idf_hal::uart::{UartDriver, UartRxDriver, UartTxDriver, config::Config};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::sys::EspError;

use crate::link::transport::{SerialRead, SerialWrite};

/// UART line settings for the link (8N1, no flow control).
pub fn link_uart_config(baud_rate: u32) -> Config {
    Config::new().baudrate(Hertz(baud_rate))
}

/// Receive half of the link UART.
pub struct UartReader {
    rx: UartRxDriver<'static>,
}

/// Transmit half of the link UART.
pub struct UartWriter {
    tx: UartTxDriver<'static>,
}

/// Split a configured driver into link transport halves.
pub fn split(driver: UartDriver<'static>) -> (UartReader, UartWriter) {
    let (tx, rx) = driver.into_split();
    (UartReader { rx }, UartWriter { tx })
}

impl SerialRead for UartReader {
    type Error = EspError;

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, EspError> {
        // `uart_read_bytes` blocks until `buf` is full or the ticks run out.
        self.rx.read(buf, TickType::from(timeout).ticks())
    }
}

impl SerialWrite for UartWriter {
    type Error = EspError;

    fn write(&mut self, data: &[u8]) -> Result<(), EspError> {
        let mut sent = 0;
        while sent < data.len() {
            sent += self.tx.write(&data[sent..])?;
        }
        Ok(())
    }
}
