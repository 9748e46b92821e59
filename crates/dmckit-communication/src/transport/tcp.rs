//! TCP transport for network-attached DMC controllers
//!
//! Controllers on Ethernet speak the same line protocol as the serial
//! link: one ASCII command terminated by CR, one reply terminated by the
//! `:` prompt. The default command port is 23.

use super::{read_reply, strip_address_flags, with_retries, RetryPolicy, Transport};
use dmckit_core::{DmcError, Result};
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Default DMC command port
const DEFAULT_PORT: u16 = 23;

/// Transport over a TCP link
pub struct TcpTransport {
    stream: Option<TcpStream>,
    /// Per-read timeout on the socket
    read_timeout: Duration,
    /// Timeout for establishing the connection
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport with default timeouts
    pub fn new() -> Self {
        Self {
            stream: None,
            read_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(2),
        }
    }

    /// Override the per-read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    fn resolve(address: &str) -> Result<std::net::SocketAddr> {
        let bare = strip_address_flags(address);
        let with_port = if bare.contains(':') {
            bare.to_string()
        } else {
            format!("{}:{}", bare, DEFAULT_PORT)
        };
        with_port
            .to_socket_addrs()
            .map_err(|e| DmcError::comm(format!("cannot resolve {}: {}", bare, e)))?
            .next()
            .ok_or_else(|| DmcError::comm(format!("no address for {}", bare)))
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn open(&mut self, address: &str) -> Result<()> {
        let addr = Self::resolve(address)?;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|e| {
            tracing::warn!("Failed to open TCP link to {}: {}", addr, e);
            DmcError::comm(format!("failed to open {}: {}", addr, e))
        })?;
        stream
            .set_read_timeout(Some(self.read_timeout))
            .map_err(|e| DmcError::comm(e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| DmcError::comm(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn send_and_receive(&mut self, line: &str, retry: RetryPolicy) -> Result<String> {
        let stream = self.stream.as_mut().ok_or(DmcError::NotConnected)?;
        with_retries(retry, || {
            stream.write_all(line.as_bytes())?;
            stream.write_all(b"\r")?;
            read_reply(stream)
        })
    }
}
