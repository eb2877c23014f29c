use std::fmt;

use serde::{Deserialize, Serialize};

/// NR subcarrier spacing; fixes the number of slots per millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubcarrierSpacing {
    #[default]
    Khz15,
    Khz30,
    Khz60,
    Khz120,
    Khz240,
}

impl SubcarrierSpacing {
    pub const fn numerology(self) -> u32 {
        match self {
            SubcarrierSpacing::Khz15 => 0,
            SubcarrierSpacing::Khz30 => 1,
            SubcarrierSpacing::Khz60 => 2,
            SubcarrierSpacing::Khz120 => 3,
            SubcarrierSpacing::Khz240 => 4,
        }
    }

    pub const fn slots_per_ms(self) -> u32 {
        1 << self.numerology()
    }
}

/// Monotonic slot counter used to timestamp head-of-line arrivals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotPoint(pub u64);

impl SlotPoint {
    pub const fn count(self) -> u64 {
        self.0
    }

    /// Slots elapsed since `earlier`, zero if `earlier` is in the future.
    pub const fn slots_since(self, earlier: SlotPoint) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}
