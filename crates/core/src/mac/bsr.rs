use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use super::lcid::{LcgId, MAX_NOF_LCGS};

/// Largest buffer size a short BSR can report without saturating. Above it
/// a short report no longer tells how much data is really buffered.
pub const MAX_SHORT_BSR_RELIABLE_BYTES: u32 = 150_000;

/// Largest buffer size a long BSR can encode. Reports above it are clamped.
pub const MAX_BSR_BYTES: u32 = 81_338_368;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BsrFormat {
    ShortBsr,
    ShortTruncatedBsr,
    LongBsr,
    LongTruncatedBsr,
}

impl BsrFormat {
    pub const fn is_short(self) -> bool {
        matches!(self, BsrFormat::ShortBsr | BsrFormat::ShortTruncatedBsr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UlBsrLcgReport {
    pub lcg_id: LcgId,
    pub nof_bytes: u32,
}

/// Buffer Status Report decoded from a UL MAC PDU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UlBsrIndication {
    pub format: BsrFormat,
    pub reported_lcgs: ArrayVec<UlBsrLcgReport, MAX_NOF_LCGS>,
}

impl UlBsrIndication {
    pub fn new(format: BsrFormat) -> Self {
        UlBsrIndication {
            format,
            reported_lcgs: ArrayVec::new(),
        }
    }

    pub fn short(lcg_id: LcgId, nof_bytes: u32) -> Self {
        let mut bsr = Self::new(BsrFormat::ShortBsr);
        bsr.push(lcg_id, nof_bytes);
        bsr
    }

    /// Adds a group report; a group already in the report is overwritten.
    pub fn push(&mut self, lcg_id: LcgId, nof_bytes: u32) {
        match self.reported_lcgs.iter_mut().find(|r| r.lcg_id == lcg_id) {
            Some(report) => report.nof_bytes = nof_bytes,
            None => self.reported_lcgs.push(UlBsrLcgReport { lcg_id, nof_bytes }),
        }
    }
}
