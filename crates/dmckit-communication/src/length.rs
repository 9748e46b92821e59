//! Array length discovery
//!
//! Controller arrays have a fixed declared capacity but a shorter logical
//! length: the data-bearing prefix. When the controller dialect supports
//! negative-index length queries (`name[-1]`), that is the exact answer.
//! Otherwise the array is probed index-by-index and a run of trailing
//! near-zero values is taken to mean "end of meaningful data". The
//! heuristic is unsound for data with legitimate interior zeros; callers
//! needing exact length must use the direct query.

use crate::session::DmcSession;
use dmckit_core::{parse_float_reply, values::is_undeclared, DmcError, Result};

/// Magnitudes at or below this read as zero
const ZERO_THRESHOLD: f64 = 1e-9;
/// Default count of consecutive zeros that ends the scan
pub const DEFAULT_ZERO_RUN: usize = 5;

impl DmcSession {
    /// Probe an array's logical length with the trailing-zero-run heuristic
    ///
    /// Scans `0..min(max_edges, probe_max)`, tracking the highest index
    /// with a magnitude above 1e-9. The scan stops early after `zero_run`
    /// consecutive near-zero values. A `ControllerNotReady` mid-scan
    /// (array undeclared) truncates the scan rather than propagating.
    /// Returns `last_nonzero + 1`, or 0 when nothing nonzero was seen.
    pub fn discover_length(
        &mut self,
        name: &str,
        probe_max: usize,
        zero_run: usize,
    ) -> Result<usize> {
        if !self.is_connected() {
            return Err(DmcError::NotConnected);
        }
        let limit = probe_max.min(self.config.max_edges);
        let zero_run = zero_run.max(1);

        let mut last_nonzero: Option<usize> = None;
        let mut zeros = 0usize;
        for index in 0..limit {
            match self.read_element_silent(name, index) {
                Ok(value) => {
                    if value.abs() > ZERO_THRESHOLD {
                        last_nonzero = Some(index);
                        zeros = 0;
                    } else {
                        zeros += 1;
                        if zeros >= zero_run {
                            break;
                        }
                    }
                }
                Err(e) if e.is_not_ready() => {
                    tracing::debug!("length scan of {} truncated at {}: {}", name, index, e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(last_nonzero.map_or(0, |i| i + 1))
    }

    /// Direct length query via the `name[-1]` convention
    ///
    /// Fails with `ControllerNotReady` when the dialect replies `?`.
    pub fn query_length(&mut self, name: &str) -> Result<usize> {
        let reply = self.execute_silent(&format!("MG {}[-1]", name))?;
        if is_undeclared(&reply) {
            return Err(DmcError::not_ready(format!(
                "{} does not answer a length query",
                name
            )));
        }
        let value = parse_float_reply(&reply)?;
        if value < 0.0 {
            return Err(DmcError::parse(reply));
        }
        Ok(value as usize)
    }

    /// Array length with the default tuning: probe up to `max_edges`
    /// with a zero run of [`DEFAULT_ZERO_RUN`]
    pub fn array_length_default(&mut self, name: &str) -> Result<usize> {
        let probe_max = self.config.max_edges;
        self.array_length(name, probe_max, DEFAULT_ZERO_RUN)
    }

    /// Array length, preferring the direct query over the heuristic
    pub fn array_length(&mut self, name: &str, probe_max: usize, zero_run: usize) -> Result<usize> {
        match self.query_length(name) {
            Ok(len) => Ok(len),
            Err(e) if e.is_not_connected() => Err(e),
            Err(e) => {
                tracing::debug!("length query for {} failed: {}; probing instead", name, e);
                self.discover_length(name, probe_max, zero_run)
            }
        }
    }
}
