//! Readiness polling state machine
//!
//! After connecting (or after a download program restarts), the
//! controller's symbols and arrays take a moment to be declared. This
//! machine polls a cheap status symbol and the first element of every
//! dependent array until all of them return parsable numeric values,
//! bounded by a timeout. A literal `?` reply means "not yet declared"
//! and is treated as not-ready, not as an error.

use crate::session::{DmcSession, READY_QUERY};
use dmckit_core::{parse_float_reply, values::is_undeclared, DmcError, Result};
use std::time::{Duration, Instant};

/// Default readiness timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default poll interval
pub const DEFAULT_POLL: Duration = Duration::from_millis(100);

/// State of the readiness machine
///
/// WAITING is the initial state on entry; READY and TIMED_OUT are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// Probes have not all returned numeric values yet
    Waiting,
    /// Every probe returned a parsable numeric value
    Ready,
    /// The timeout elapsed without success
    TimedOut,
}

impl DmcSession {
    /// [`wait_for_ready`](Self::wait_for_ready) with the default timeout
    /// and poll interval
    pub fn wait_for_ready_default(&mut self) -> Result<()> {
        self.wait_for_ready(DEFAULT_TIMEOUT, DEFAULT_POLL)
    }

    /// Block until the controller reports ready, or the timeout elapses
    ///
    /// Idempotent: calling again after READY re-verifies rather than
    /// assuming stale state, because the connection can be dropped and
    /// re-established externally. This is a sleep-based loop; run it off
    /// any latency-sensitive thread.
    pub fn wait_for_ready(&mut self, timeout: Duration, poll: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = ReadinessState::Waiting;
        let mut last_err: Option<DmcError> = None;

        while state == ReadinessState::Waiting {
            if !self.is_connected() {
                return Err(DmcError::NotConnected);
            }
            match self.probe_ready() {
                Ok(true) => state = ReadinessState::Ready,
                Ok(false) => last_err = None,
                Err(e) => {
                    tracing::debug!("readiness probe failed: {}", e);
                    last_err = Some(e);
                }
            }
            if state == ReadinessState::Waiting {
                if Instant::now() >= deadline {
                    state = ReadinessState::TimedOut;
                } else {
                    std::thread::sleep(poll);
                }
            }
        }

        match state {
            ReadinessState::Ready => Ok(()),
            _ => Err(last_err
                .unwrap_or_else(|| DmcError::not_ready("no error".to_string()))),
        }
    }

    /// One pass over the readiness probes
    ///
    /// Uses the silent path throughout; a 50-iteration wait must not
    /// flood the observer.
    fn probe_ready(&mut self) -> Result<bool> {
        let reply = self.execute_silent(READY_QUERY)?;
        if is_undeclared(&reply) || parse_float_reply(&reply).is_err() {
            return Ok(false);
        }
        let arrays = self.config.ready_arrays.clone();
        for name in &arrays {
            let reply = self.execute_silent(&format!("MG {}[0]", name))?;
            if is_undeclared(&reply) || parse_float_reply(&reply).is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
