//! Bulk array transfer
//!
//! Controller-side arrays are read and written element-range at a time.
//! Many element references are packed into a single command line under a
//! byte-length cap, because the controller's command parser enforces a
//! maximum line length. When the transport exposes a native block-transfer
//! primitive it is tried first, with graceful fallback to the chunked path
//! on any failure, including a partial or garbled payload.

use crate::session::DmcSession;
use crate::transport::BlockFormat;
use dmckit_core::{parse_number_list, values::is_undeclared, DmcError, Result};

impl DmcSession {
    /// Read the inclusive element range `[first, last]` of an array
    ///
    /// `first > last` yields an empty sequence, not an error. Requires an
    /// open connection; fails with `NotConnected` otherwise and performs
    /// no wire I/O on a contract violation.
    pub fn upload(&mut self, name: &str, first: usize, last: usize) -> Result<Vec<f64>> {
        if !self.is_connected() {
            return Err(DmcError::NotConnected);
        }
        if first > last {
            return Ok(Vec::new());
        }
        self.check_index(last)?;

        let expected = last - first + 1;

        // Fast path: one native call for the whole range. Any failure,
        // including a short payload, falls through to the chunked path.
        match self.transport.block_upload(name, first, last) {
            Ok(payload) => {
                let values = parse_number_list(&payload);
                if values.len() == expected {
                    return Ok(values);
                }
                tracing::debug!(
                    "block upload of {} returned {} of {} values; falling back",
                    name,
                    values.len(),
                    expected
                );
            }
            Err(e) if e.is_unsupported() => {}
            Err(e) => tracing::debug!("block upload of {} failed: {}; falling back", name, e),
        }

        self.upload_chunked(name, first, last, expected)
    }

    fn upload_chunked(
        &mut self,
        name: &str,
        first: usize,
        last: usize,
        expected: usize,
    ) -> Result<Vec<f64>> {
        let chunk = self.config.chunk_elements.max(1);
        let mut out = Vec::with_capacity(expected);
        let mut start = first;
        while start <= last {
            let end = last.min(start + chunk - 1);
            let refs = (start..=end)
                .map(|i| format!("{}[{}]", name, i))
                .collect::<Vec<_>>()
                .join(", ");
            let reply = self.execute(&format!("MG {}", refs))?;
            if is_undeclared(&reply) {
                // The array is undeclared, not merely slow.
                return Err(DmcError::not_ready(format!("{} is undeclared", name)));
            }
            let values = parse_number_list(&reply);
            if values.len() != end - start + 1 {
                return Err(DmcError::parse(reply));
            }
            out.extend(values);
            start = end + 1;
        }
        Ok(out)
    }

    /// Read `count` elements starting at `start`
    ///
    /// Window form of [`upload`](Self::upload): `count == 0` or a window
    /// past `max_edges` is a contract violation.
    pub fn read_array_slice(&mut self, name: &str, start: usize, count: usize) -> Result<Vec<f64>> {
        self.check_window(start, count)?;
        self.upload(name, start, start + count - 1)
    }

    /// Write consecutive elements starting at `first`; returns the count written
    ///
    /// Empty `values` writes nothing and returns 0. The native block
    /// primitive is probed in each payload format in order; when all of
    /// them fail, assignments are batched into `;`-separated command
    /// lines under the configured length cap.
    pub fn download(&mut self, name: &str, first: usize, values: &[f64]) -> Result<usize> {
        if !self.is_connected() {
            return Err(DmcError::NotConnected);
        }
        if values.is_empty() {
            return Ok(0);
        }
        self.check_index(first + values.len() - 1)?;

        for format in BlockFormat::DOWNLOAD_ORDER {
            match self.transport.block_download(name, first, values, format) {
                Ok(()) => return Ok(values.len()),
                Err(e) if e.is_unsupported() => break,
                Err(e) => {
                    tracing::debug!("block download ({:?}) of {} failed: {}", format, name, e)
                }
            }
        }

        let updates: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .map(|(offset, value)| (first + offset, *value))
            .collect();
        self.send_assignments(name, &updates)
    }

    /// Write a sparse set of (index, value) updates; returns the count written
    pub fn write_updates(&mut self, name: &str, updates: &[(usize, f64)]) -> Result<usize> {
        if !self.is_connected() {
            return Err(DmcError::NotConnected);
        }
        if updates.is_empty() {
            return Ok(0);
        }
        let mut sorted = updates.to_vec();
        sorted.sort_by_key(|(index, _)| *index);
        for (index, _) in &sorted {
            self.check_index(*index)?;
        }
        self.send_assignments(name, &sorted)
    }

    fn send_assignments(&mut self, name: &str, updates: &[(usize, f64)]) -> Result<usize> {
        let cap = self.config.max_line_len;
        let mut line = String::new();
        let mut written = 0usize;
        for (index, value) in updates {
            let assignment = format!("{}[{}]={}", name, index, value);
            if line.is_empty() {
                line = assignment;
            } else if line.len() + assignment.len() + 1 < cap {
                line.push(';');
                line.push_str(&assignment);
            } else {
                self.execute(&line)?;
                written += line.matches('=').count();
                line = assignment;
            }
        }
        if !line.is_empty() {
            self.execute(&line)?;
            written += line.matches('=').count();
        }
        Ok(written)
    }
}
