//! Controller status snapshot
//!
//! A point-in-time read of the reported positions for axes A-D, the digital
//! status bitfield from `_TSA`, and a speed scalar. Snapshots are produced
//! fresh on every poll and never mutated after creation.

use crate::values::{bit_is_set, parse_number_list};
use serde::{Deserialize, Serialize};

/// Motion axes exposed by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Axis A
    A,
    /// Axis B
    B,
    /// Axis C
    C,
    /// Axis D
    D,
}

impl Axis {
    /// All axes in controller order
    pub const ALL: [Axis; 4] = [Axis::A, Axis::B, Axis::C, Axis::D];

    /// The controller's letter name for this axis
    pub fn letter(&self) -> char {
        match self {
            Axis::A => 'A',
            Axis::B => 'B',
            Axis::C => 'C',
            Axis::D => 'D',
        }
    }

    fn index(&self) -> usize {
        match self {
            Axis::A => 0,
            Axis::B => 1,
            Axis::C => 2,
            Axis::D => 3,
        }
    }
}

/// Point-in-time controller status
///
/// Built from the reply to `MG{Z10.0} _RPA, _RPB, _RPC, _RPD, _TSA`.
/// Missing fields default to zero; a short reply is a degraded snapshot,
/// not an error, because the polling loop must never crash.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Reported positions for axes A-D, in encoder counts
    pub positions: [f64; 4],
    /// Digital status bitfield (`_TSA`): inputs, limits, faults
    pub status_bits: u32,
    /// Speed scalar (`_SPA`), zero when unavailable
    pub speed: f64,
}

impl StatusSnapshot {
    /// Build a snapshot from a multi-value status reply
    ///
    /// Expects positions for A-D followed by the status bitfield; any
    /// missing trailing values read as zero.
    pub fn from_reply(reply: &str) -> Self {
        let nums = parse_number_list(reply);
        let mut positions = [0.0; 4];
        for (slot, value) in positions.iter_mut().zip(nums.iter()) {
            *slot = *value;
        }
        let status_bits = nums.get(4).copied().unwrap_or(0.0) as u32;
        Self {
            positions,
            status_bits,
            speed: 0.0,
        }
    }

    /// Attach the separately-read speed scalar
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Reported position of one axis
    pub fn position(&self, axis: Axis) -> f64 {
        self.positions[axis.index()]
    }

    /// Whether the axis is currently executing motion (status bit 7)
    pub fn in_motion(&self) -> bool {
        bit_is_set(self.status_bits, 7)
    }

    /// Whether the reverse limit switch is tripped
    ///
    /// The controller reports the switch inactive as a set bit (bit 2),
    /// so a cleared bit means the limit is reached.
    pub fn reverse_limit_tripped(&self) -> bool {
        !bit_is_set(self.status_bits, 2)
    }

    /// Whether the forward limit switch is tripped (bit 3, inverted)
    pub fn forward_limit_tripped(&self) -> bool {
        !bit_is_set(self.status_bits, 3)
    }

    /// Whether the motor is off (status bit 5)
    pub fn motor_off(&self) -> bool {
        bit_is_set(self.status_bits, 5)
    }
}
