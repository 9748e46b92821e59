//! # DMCKit Core
//!
//! Core types and utilities for DMCKit, a session layer for Galil DMC
//! motion controllers driving motorized cutting-machine axes.
//! Provides the error taxonomy, numeric reply parsing, and the status
//! snapshot model shared by the communication layer and its callers.

pub mod error;
pub mod status;
pub mod values;

pub use error::{DmcError, Result};
pub use status::{Axis, StatusSnapshot};
pub use values::{
    bit_is_set, clamp, is_undeclared, mm_to_pulses, parse_float_reply, parse_number_list,
    pulses_to_mm,
};
