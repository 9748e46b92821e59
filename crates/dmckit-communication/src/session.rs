//! Command session for one DMC controller
//!
//! Wraps a [`Transport`] with the "must be connected" precondition, the
//! `TC1` diagnostic recovery protocol, and the observer side-channel the
//! UI attaches to. Exactly one logical connection per session; commands
//! are strictly request/reply, one outstanding at a time.

use crate::transport::{RetryPolicy, Transport};
use dmckit_core::{parse_float_reply, values::is_undeclared, DmcError, Result, StatusSnapshot};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Multi-value status read: positions A-D plus the digital status bitfield
pub(crate) const STATUS_QUERY: &str = "MG{Z10.0} _RPA, _RPB, _RPC, _RPD, _TSA";
/// Speed scalar read, best-effort
pub(crate) const SPEED_QUERY: &str = "MG{Z10.0} _SPA";
/// Cheap numeric symbol probed by the readiness loop
pub(crate) const READY_QUERY: &str = "MG{Z10.0} _TPA";
/// "Tell error code 1": fetches the controller's explanation of the last failure
pub(crate) const DIAGNOSTIC_QUERY: &str = "TC1";

/// Callback receiving a one-line description of every command+response
/// pair and every error. The sole side-channel to the UI layer.
pub type Observer = Arc<dyn Fn(&str) + Send + Sync>;

/// Session tuning knobs
///
/// All of these are set before concurrent use begins and are not intended
/// to change while commands are in flight.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Retry policy handed to the transport for each command
    pub retry: RetryPolicy,
    /// Upper bound (exclusive) for array indices
    pub max_edges: usize,
    /// Arrays whose first element the readiness loop probes
    pub ready_arrays: Vec<String>,
    /// Maximum element references per chunked read line
    pub chunk_elements: usize,
    /// Command line length cap for chunked writes
    ///
    /// The controller's command parser enforces a maximum line length;
    /// 300 is a safety margin below the hardware limit.
    pub max_line_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_edges: 150,
            ready_arrays: vec!["EdgeB".to_string(), "EdgeC".to_string()],
            chunk_elements: 32,
            max_line_len: 300,
        }
    }
}

/// One logical session to one controller address
///
/// Owns the transport exclusively. Not safe for concurrent command
/// issuance from multiple callers without external serialization; the
/// intended model is a single background worker (see
/// [`crate::service::ControllerService`]).
pub struct DmcSession {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) config: SessionConfig,
    address: Option<String>,
    connected: bool,
    last_alive: Option<Instant>,
    observer: Option<Observer>,
}

impl DmcSession {
    /// Create a session over the given transport with default configuration
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create a session with explicit configuration
    pub fn with_config(transport: Box<dyn Transport>, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            address: None,
            connected: false,
            last_alive: None,
            observer: None,
        }
    }

    /// Attach or clear the observer callback
    pub fn set_observer(&mut self, observer: Option<Observer>) {
        self.observer = observer;
    }

    /// Set the array index cap
    pub fn set_max_edges(&mut self, max_edges: usize) {
        self.config.max_edges = max_edges;
    }

    /// The configured array index cap
    pub fn max_edges(&self) -> usize {
        self.config.max_edges
    }

    /// Replace the arrays probed by the readiness loop
    pub fn set_ready_arrays(&mut self, arrays: Vec<String>) {
        self.config.ready_arrays = arrays;
    }

    /// The address of the current connection, if any
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// When a command last completed successfully
    pub fn last_alive(&self) -> Option<Instant> {
        self.last_alive
    }

    /// Open a connection to a controller address
    ///
    /// A previously open connection is closed first. The address may carry
    /// gclib-style flags (`192.168.0.42 -d`); transports strip them.
    pub fn connect(&mut self, address: &str) -> Result<()> {
        if self.connected {
            self.disconnect();
        }
        match self.transport.open(address) {
            Ok(()) => {
                self.connected = true;
                self.address = Some(address.to_string());
                self.last_alive = None;
                self.notify(&format!("Connected to {}", address));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("connect to {} failed: {}", address, e);
                self.connected = false;
                self.notify(&format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Close the connection; safe to call when already closed
    ///
    /// In-flight calls issued elsewhere fail fast with `NotConnected`
    /// afterwards; this is the only cancellation mechanism.
    pub fn disconnect(&mut self) {
        if self.connected {
            self.notify("Disconnected");
        }
        self.transport.close();
        self.connected = false;
        self.address = None;
    }

    /// Whether a verified connection is open
    pub fn is_connected(&self) -> bool {
        self.connected && self.transport.is_connected()
    }

    /// Execute one command and return the raw reply
    ///
    /// Fails with `NotConnected` when no connection is open. On failure a
    /// second, best-effort `TC1` diagnostic command runs on the same
    /// transport and its text (or the original error text when that also
    /// fails) becomes the error payload.
    pub fn execute(&mut self, command: &str) -> Result<String> {
        self.run(command, true)
    }

    /// Execute without any observer side effect
    ///
    /// For high-frequency polling paths, to avoid flooding an attached
    /// log sink.
    pub fn execute_silent(&mut self, command: &str) -> Result<String> {
        self.run(command, false)
    }

    fn run(&mut self, command: &str, observe: bool) -> Result<String> {
        if !self.is_connected() {
            return Err(DmcError::NotConnected);
        }
        let retry = self.config.retry;
        match self.transport.send_and_receive(command, retry) {
            Ok(reply) => {
                self.last_alive = Some(Instant::now());
                if observe {
                    self.notify(&format!("CMD {} -> {}", command, reply.trim()));
                }
                Ok(reply)
            }
            Err(e) => {
                // Best-effort: a failure while fetching the diagnostic must
                // never mask the original error.
                let diagnostic = self
                    .transport
                    .send_and_receive(DIAGNOSTIC_QUERY, retry)
                    .map(|d| d.trim().to_string())
                    .unwrap_or_else(|_| e.to_string());
                if observe {
                    self.notify(&format!("Error: {}", diagnostic));
                }
                Err(DmcError::CommandFailed {
                    command: command.to_string(),
                    diagnostic,
                })
            }
        }
    }

    /// Read a fresh status snapshot
    pub fn read_status(&mut self) -> Result<StatusSnapshot> {
        self.read_status_inner(true)
    }

    /// Read a status snapshot through the silent path
    ///
    /// Fixed-cadence pollers (e.g. 10 Hz) must use this variant.
    pub fn read_status_silent(&mut self) -> Result<StatusSnapshot> {
        self.read_status_inner(false)
    }

    fn read_status_inner(&mut self, observe: bool) -> Result<StatusSnapshot> {
        let reply = self.run(STATUS_QUERY, observe)?;
        let snapshot = StatusSnapshot::from_reply(&reply);
        // Speed is best-effort; an axis without _SPA reads zero.
        let speed = self
            .run(SPEED_QUERY, observe)
            .ok()
            .and_then(|r| parse_float_reply(&r).ok())
            .unwrap_or(0.0);
        Ok(snapshot.with_speed(speed))
    }

    /// Read one array element
    pub fn read_element(&mut self, name: &str, index: usize) -> Result<f64> {
        self.read_element_inner(name, index, true)
    }

    /// Read one array element without observer traffic
    pub(crate) fn read_element_silent(&mut self, name: &str, index: usize) -> Result<f64> {
        self.read_element_inner(name, index, false)
    }

    fn read_element_inner(&mut self, name: &str, index: usize, observe: bool) -> Result<f64> {
        self.check_index(index)?;
        let reply = self.run(&format!("MG {}[{}]", name, index), observe)?;
        if is_undeclared(&reply) {
            return Err(DmcError::not_ready(format!("{} is undeclared", name)));
        }
        parse_float_reply(&reply)
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.config.max_edges {
            return Err(DmcError::IndexOutOfRange {
                index,
                max: self.config.max_edges,
            });
        }
        Ok(())
    }

    pub(crate) fn check_window(&self, start: usize, count: usize) -> Result<()> {
        if count == 0 {
            return Err(DmcError::IndexOutOfRange {
                index: start,
                max: self.config.max_edges,
            });
        }
        if start + count > self.config.max_edges {
            return Err(DmcError::IndexOutOfRange {
                index: start + count - 1,
                max: self.config.max_edges,
            });
        }
        Ok(())
    }

    /// Deliver one line to the observer, swallowing any panic it raises
    pub(crate) fn notify(&self, line: &str) {
        if let Some(observer) = &self.observer {
            let observer = observer.clone();
            if catch_unwind(AssertUnwindSafe(|| observer(line))).is_err() {
                tracing::debug!("observer callback panicked; ignored");
            }
        }
    }
}
