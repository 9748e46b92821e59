//! Error handling for DMCKit
//!
//! Provides the error taxonomy for the controller session layer:
//! - Connection preconditions (`NotConnected`)
//! - Transport failures after retries (`Comm`)
//! - Controller-side rejections enriched with a diagnostic (`CommandFailed`)
//! - Undeclared symbols/arrays (`ControllerNotReady`)
//! - Caller contract violations (`IndexOutOfRange`)
//! - Unintelligible replies (`Parse`)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Session-layer error type
///
/// Represents every failure mode a controller operation can surface.
/// Semantic failures propagate immediately; only transient I/O failures
/// are retried, and only inside the transport.
#[derive(Error, Debug, Clone)]
pub enum DmcError {
    /// No open, verified connection when an operation required one
    #[error("Controller not connected")]
    NotConnected,

    /// Transport-level I/O failure after exhausting retries
    #[error("Communication error: {reason}")]
    Comm {
        /// Description of the underlying I/O failure.
        reason: String,
    },

    /// Command rejected by the controller
    ///
    /// `diagnostic` is the controller's `TC1` error text when it could be
    /// fetched, otherwise the original transport error text.
    #[error("Command '{command}' failed: {diagnostic}")]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// Human-meaningful controller-side explanation.
        diagnostic: String,
    },

    /// A symbol or array exists but is not yet populated/declared
    ///
    /// Signaled by the literal `?` reply. Not retried automatically except
    /// inside the bounded readiness polling loop.
    #[error("Controller not ready: {reason}")]
    ControllerNotReady {
        /// What was undeclared, or the last observed error while waiting.
        reason: String,
    },

    /// Caller-supplied index or range outside `[0, max_edges)`
    #[error("Index {index} out of range [0, {max})")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The configured upper bound (exclusive).
        max: usize,
    },

    /// Reply text could not be interpreted as the required numeric data
    #[error("Cannot parse reply as number: {text:?}")]
    Parse {
        /// The offending raw reply text, kept for diagnostics.
        text: String,
    },

    /// The transport does not provide the requested native primitive
    #[error("Not supported by this transport: {what}")]
    Unsupported {
        /// The missing capability.
        what: String,
    },
}

impl DmcError {
    /// Create a communication error from a reason string
    pub fn comm(reason: impl Into<String>) -> Self {
        DmcError::Comm {
            reason: reason.into(),
        }
    }

    /// Create a not-ready error from a reason string
    pub fn not_ready(reason: impl Into<String>) -> Self {
        DmcError::ControllerNotReady {
            reason: reason.into(),
        }
    }

    /// Create a parse error carrying the offending reply text
    pub fn parse(text: impl Into<String>) -> Self {
        DmcError::Parse { text: text.into() }
    }

    /// Create an unsupported-capability error
    pub fn unsupported(what: impl Into<String>) -> Self {
        DmcError::Unsupported { what: what.into() }
    }

    /// Check if this is a not-ready error
    pub fn is_not_ready(&self) -> bool {
        matches!(self, DmcError::ControllerNotReady { .. })
    }

    /// Check if this is an unsupported-capability error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, DmcError::Unsupported { .. })
    }

    /// Check if this is a connection-precondition error
    pub fn is_not_connected(&self) -> bool {
        matches!(self, DmcError::NotConnected)
    }
}

impl From<std::io::Error> for DmcError {
    fn from(e: std::io::Error) -> Self {
        DmcError::comm(e.to_string())
    }
}

/// Result type using DmcError
pub type Result<T> = std::result::Result<T, DmcError>;
