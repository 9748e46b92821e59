//! Transport layer for DMC controller links
//!
//! A transport owns the physical/logical link to one controller: it opens
//! and closes the connection, writes a single ASCII command line, and reads
//! the single ASCII reply line. Short bounded retries are applied to
//! transient I/O failures only; the transport performs no semantic
//! interpretation of replies.

pub mod serial;
pub mod tcp;

use dmckit_core::{DmcError, Result};
use std::io::Read;
use std::time::Duration;

/// Retry policy for transient I/O failures
///
/// Applied inside `send_and_receive` only. Semantic failures (rejected
/// commands, undeclared symbols) are never retried here.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt
    pub retries: u32,
    /// Fixed backoff between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Payload encoding for the native block-download primitive
///
/// Vendor drivers accept several call signatures; the session probes them
/// in a fixed order and falls back to chunked writes when none succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFormat {
    /// Plain ASCII payload
    Ascii,
    /// ASCII payload with an explicit delimiter flag
    AsciiDelimited,
    /// Packed little-endian binary buffer
    BinaryLe,
}

impl BlockFormat {
    /// Probe order for block downloads
    pub const DOWNLOAD_ORDER: [BlockFormat; 3] =
        [BlockFormat::Ascii, BlockFormat::AsciiDelimited, BlockFormat::BinaryLe];
}

/// Link to one DMC controller
///
/// Implementations must not log through the session observer or mutate any
/// shared state; their only side effect is the wire.
pub trait Transport: Send {
    /// Establish the logical link to an address
    ///
    /// Failure leaves the transport closed and reports the underlying cause.
    fn open(&mut self, address: &str) -> Result<()>;

    /// Close the link; safe to call when already closed
    fn close(&mut self);

    /// Whether the link is currently open
    fn is_connected(&self) -> bool;

    /// Write one command line and read one reply line
    ///
    /// Transient I/O failures are retried per `retry` with a fixed backoff
    /// before a `Comm` error surfaces. The reply is returned raw; parsing
    /// is the caller's job.
    fn send_and_receive(&mut self, line: &str, retry: RetryPolicy) -> Result<String>;

    /// Native whole-range array read, when the driver exposes one
    ///
    /// Returns the comma/whitespace-delimited numeric payload. Transports
    /// without the primitive report `Unsupported` and the session falls
    /// back to chunked element reads.
    fn block_upload(&mut self, _name: &str, _first: usize, _last: usize) -> Result<String> {
        Err(DmcError::unsupported("block upload"))
    }

    /// Native whole-range array write in the given payload format
    fn block_download(
        &mut self,
        _name: &str,
        _first: usize,
        _values: &[f64],
        _format: BlockFormat,
    ) -> Result<()> {
        Err(DmcError::unsupported("block download"))
    }
}

/// Transport that accepts no traffic
///
/// Stand-in before a real link is configured; every command fails with a
/// communication error.
#[derive(Debug, Default)]
pub struct NoOpTransport {
    connected: bool,
}

impl NoOpTransport {
    /// Create a new no-op transport
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for NoOpTransport {
    fn open(&mut self, _address: &str) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_and_receive(&mut self, _line: &str, _retry: RetryPolicy) -> Result<String> {
        Err(DmcError::comm("no-op transport"))
    }
}

/// Strip gclib-style option flags from an address string
///
/// The original driver decorates addresses with flags such as `-d` (direct
/// connection). We accept the decorated form and connect to the bare
/// address.
pub(crate) fn strip_address_flags(address: &str) -> &str {
    address
        .split_whitespace()
        .find(|part| !part.starts_with('-'))
        .unwrap_or("")
}

/// Run an I/O operation with bounded retries and fixed backoff
pub(crate) fn with_retries<T>(
    retry: RetryPolicy,
    mut op: impl FnMut() -> std::io::Result<T>,
) -> Result<T> {
    let mut last_err = None;
    for attempt in 0..=retry.retries {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt < retry.retries {
                    tracing::debug!("I/O attempt {} failed, retrying: {}", attempt + 1, e);
                    std::thread::sleep(retry.backoff);
                }
                last_err = Some(e);
            }
        }
    }
    Err(DmcError::comm(
        last_err.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

/// Read one reply up to the controller's prompt
///
/// DMC replies terminate with a `:` prompt; a leading `?` signals an
/// unknown command or undeclared symbol and is returned as the literal
/// reply for the session to interpret.
pub(crate) fn read_reply(reader: &mut impl Read) -> std::io::Result<String> {
    let mut out = String::new();
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "link closed while reading reply",
            ));
        }
        match byte[0] {
            b':' => break,
            b'?' if out.trim().is_empty() => return Ok("?".to_string()),
            b => out.push(b as char),
        }
    }
    Ok(out.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reply_stops_at_prompt() {
        let mut cur = Cursor::new(b" 10000.0000\r\n:".to_vec());
        assert_eq!(read_reply(&mut cur).unwrap(), "10000.0000");
    }

    #[test]
    fn question_mark_is_the_whole_reply() {
        let mut cur = Cursor::new(b"?".to_vec());
        assert_eq!(read_reply(&mut cur).unwrap(), "?");
    }

    #[test]
    fn eof_is_an_error() {
        let mut cur = Cursor::new(b"1.0".to_vec());
        assert!(read_reply(&mut cur).is_err());
    }

    #[test]
    fn flags_are_stripped() {
        assert_eq!(strip_address_flags("192.168.0.42 -d"), "192.168.0.42");
        assert_eq!(strip_address_flags("-d COM3"), "COM3");
        assert_eq!(strip_address_flags("10.0.0.1:23"), "10.0.0.1:23");
    }

    #[test]
    fn retries_then_surfaces_comm_error() {
        let mut calls = 0;
        let err = with_retries(
            RetryPolicy {
                retries: 2,
                backoff: Duration::from_millis(1),
            },
            || -> std::io::Result<()> {
                calls += 1;
                Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            },
        )
        .unwrap_err();
        assert_eq!(calls, 3);
        assert!(matches!(err, DmcError::Comm { .. }));
    }

    #[test]
    fn retry_recovers_on_second_attempt() {
        let mut calls = 0;
        let v = with_retries(RetryPolicy::default(), || -> std::io::Result<u8> {
            calls += 1;
            if calls < 2 {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "flaky"))
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!(v, 7);
    }
}
