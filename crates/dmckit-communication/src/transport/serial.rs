//! Serial transport for direct-attached DMC controllers
//!
//! Covers RS-232/USB links (`COM3`, `/dev/ttyUSB0`). Same line protocol
//! as the network link: CR-terminated command out, `:`-terminated reply
//! back.

use super::{read_reply, strip_address_flags, with_retries, RetryPolicy, Transport};
use dmckit_core::{DmcError, Result};
use std::io::Write;
use std::time::Duration;

/// Default baud rate for DMC serial links
const DEFAULT_BAUD: u32 = 115_200;

/// Transport over a serial port
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Create a transport at the default baud rate
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD,
            read_timeout: Duration::from_millis(500),
        }
    }

    /// Override the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Check if an address names a serial device rather than a host
    pub fn is_serial_address(address: &str) -> bool {
        let bare = strip_address_flags(address);
        bare.starts_with("COM") || bare.starts_with("/dev/tty") || bare.starts_with("/dev/cu.")
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, address: &str) -> Result<()> {
        let bare = strip_address_flags(address);
        match serialport::new(bare, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
        {
            Ok(port) => {
                self.port = Some(port);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", bare, e);
                Err(DmcError::comm(format!("failed to open {}: {}", bare, e)))
            }
        }
    }

    fn close(&mut self) {
        self.port = None;
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send_and_receive(&mut self, line: &str, retry: RetryPolicy) -> Result<String> {
        let port = self.port.as_mut().ok_or(DmcError::NotConnected)?;
        with_retries(retry, || {
            port.write_all(line.as_bytes())?;
            port.write_all(b"\r")?;
            port.flush()?;
            read_reply(port)
        })
    }
}
