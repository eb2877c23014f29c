
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

const BITS_PER_BYTE: f64 = 8.0;
const MS_PER_SECOND: f64 = 1_000.0;

/// Throughput in bits per second.
#[derive(Debug, PartialEq, PartialOrd, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BitRate {
    value: f64,
}

impl BitRate {
    /// Converts an average of bytes per slot into bits per second.
    pub fn from_bytes_per_slot(bytes_per_slot: f64, slots_per_ms: u32) -> Self {
        debug_assert!(bytes_per_slot >= 0.0, "Value must be non-negative");
        debug_assert!(slots_per_ms > 0, "Slot duration must be set");
        BitRate {
            value: bytes_per_slot * BITS_PER_BYTE * f64::from(slots_per_ms) * MS_PER_SECOND,
        }
    }

    pub const fn new_per_second(bits: f64) -> Self {
        BitRate { value: bits }
    }

    pub const fn bits_per_second(&self) -> f64 {
        self.value
    }

    /// Whether this rate reaches a guaranteed bit rate.
    pub fn satisfies(&self, guaranteed_bps: u64) -> bool {
        self.value >= guaranteed_bps as f64
    }
}

impl Add for BitRate {
    type Output = BitRate;

    fn add(self, other: BitRate) -> BitRate {
        BitRate {
            value: self.value + other.value,
        }
    }
}

impl AddAssign for BitRate {
    fn add_assign(&mut self, other: BitRate) {
        self.value += other.value;
    }
}

impl Sub for BitRate {
    type Output = BitRate;

    fn sub(self, other: BitRate) -> BitRate {
        BitRate {
            value: (self.value - other.value).max(0.0),
        }
    }
}
