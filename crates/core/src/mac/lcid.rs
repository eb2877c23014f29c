use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of radio bearer LCIDs (SRB0..=SRB3 and DRBs up to LCID 32).
pub const MAX_NOF_RB_LCIDS: usize = 33;
/// Number of UL logical channel groups.
pub const MAX_NOF_LCGS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("logical channel id {0} is outside the radio bearer range")]
    Lcid(u8),
    #[error("logical channel group id {0} is outside 0..=7")]
    Lcg(u8),
    #[error("DL-SCH logical channel id {0} is outside 0..=63")]
    LcidDlSch(u8),
}

/// Radio bearer logical channel id (0..=32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Lcid(u8);

impl Lcid {
    pub const SRB0: Lcid = Lcid(0);
    pub const SRB1: Lcid = Lcid(1);
    pub const SRB2: Lcid = Lcid(2);
    pub const SRB3: Lcid = Lcid(3);
    pub const MIN_DRB: Lcid = Lcid(4);
    pub const MAX: Lcid = Lcid(MAX_NOF_RB_LCIDS as u8 - 1);

    pub const fn new(value: u8) -> Option<Self> {
        if (value as usize) < MAX_NOF_RB_LCIDS {
            Some(Lcid(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_srb(self) -> bool {
        self.0 < Self::MIN_DRB.0
    }

    pub const fn is_drb(self) -> bool {
        !self.is_srb()
    }

    pub fn iter() -> impl Iterator<Item = Lcid> {
        (0..MAX_NOF_RB_LCIDS as u8).map(Lcid)
    }
}

impl TryFrom<u8> for Lcid {
    type Error = IdentifierError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Lcid::new(value).ok_or(IdentifierError::Lcid(value))
    }
}

impl From<Lcid> for u8 {
    fn from(lcid: Lcid) -> u8 {
        lcid.0
    }
}

impl fmt::Display for Lcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_srb() {
            write!(f, "SRB{}", self.0)
        } else {
            write!(f, "LCID{}", self.0)
        }
    }
}

/// UL logical channel group id (0..=7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LcgId(u8);

impl LcgId {
    pub const fn new(value: u8) -> Option<Self> {
        if (value as usize) < MAX_NOF_LCGS {
            Some(LcgId(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub fn iter() -> impl Iterator<Item = LcgId> {
        (0..MAX_NOF_LCGS as u8).map(LcgId)
    }
}

impl TryFrom<u8> for LcgId {
    type Error = IdentifierError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LcgId::new(value).ok_or(IdentifierError::Lcg(value))
    }
}

impl From<LcgId> for u8 {
    fn from(lcg: LcgId) -> u8 {
        lcg.0
    }
}

impl fmt::Display for LcgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LCG{}", self.0)
    }
}

/// Identifier of a RAN slice a logical channel or group is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RanSliceId(pub u8);

impl RanSliceId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RanSliceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slice{}", self.0)
    }
}

/// Cell-local UE index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UeIndex(pub u16);

impl UeIndex {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ue{}", self.0)
    }
}

/// LCID of a DL-SCH MAC subPDU: either a radio bearer or a MAC CE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LcidDlSch(u8);

impl LcidDlSch {
    pub const RECOMMENDED_BIT_RATE: LcidDlSch = LcidDlSch(47);
    pub const SP_ZP_CSI_RS_RES_SET_ACTIV: LcidDlSch = LcidDlSch(48);
    pub const PUCCH_SPATIAL_RELATION_ACTIV: LcidDlSch = LcidDlSch(49);
    pub const SP_SRS_ACTIV: LcidDlSch = LcidDlSch(50);
    pub const SP_CSI_REPORT_ON_PUCCH_ACTIV: LcidDlSch = LcidDlSch(51);
    pub const TCI_STATE_IND_UE_PDCCH: LcidDlSch = LcidDlSch(52);
    pub const TCI_STATES_ACTIV_DEACTIV_UE_PDSCH: LcidDlSch = LcidDlSch(53);
    pub const APERIODIC_CSI_TRIGGER_STATE_SUBSELECT: LcidDlSch = LcidDlSch(54);
    pub const SP_CSI_RS_CSI_IM_RES_SET_ACTIV: LcidDlSch = LcidDlSch(55);
    pub const DUPLICATION_ACTIV: LcidDlSch = LcidDlSch(56);
    pub const SCELL_ACTIV_4_OCTET: LcidDlSch = LcidDlSch(57);
    pub const SCELL_ACTIV_1_OCTET: LcidDlSch = LcidDlSch(58);
    pub const LONG_DRX_CMD: LcidDlSch = LcidDlSch(59);
    pub const DRX_CMD: LcidDlSch = LcidDlSch(60);
    pub const TA_CMD: LcidDlSch = LcidDlSch(61);
    pub const UE_CON_RES_ID: LcidDlSch = LcidDlSch(62);
    pub const PADDING: LcidDlSch = LcidDlSch(63);
    /// Marks an unused subPDU descriptor.
    pub const INVALID: LcidDlSch = LcidDlSch(64);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::PADDING.0 {
            Some(LcidDlSch(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 <= Self::PADDING.0
    }

    pub const fn is_sdu(self) -> bool {
        (self.0 as usize) < MAX_NOF_RB_LCIDS
    }

    pub const fn is_ce(self) -> bool {
        self.0 >= Self::RECOMMENDED_BIT_RATE.0 && self.0 <= Self::UE_CON_RES_ID.0
    }

    pub const fn is_var_len_ce(self) -> bool {
        matches!(self.0, 50 | 53 | 54 | 55)
    }

    /// Payload size of fixed-size CEs. `None` for SDUs, padding and
    /// variable-length CEs.
    pub const fn sizeof_ce(self) -> Option<u32> {
        match self.0 {
            47 | 48 | 51 | 52 => Some(2),
            49 => Some(3),
            56 | 58 | 61 => Some(1),
            57 => Some(4),
            59 | 60 => Some(0),
            62 => Some(6),
            _ => None,
        }
    }

    /// The radio bearer this subPDU carries, if it is an SDU.
    pub const fn to_lcid(self) -> Option<Lcid> {
        Lcid::new(self.0)
    }
}

impl From<Lcid> for LcidDlSch {
    fn from(lcid: Lcid) -> Self {
        LcidDlSch(lcid.value())
    }
}

impl TryFrom<u8> for LcidDlSch {
    type Error = IdentifierError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LcidDlSch::new(value).ok_or(IdentifierError::LcidDlSch(value))
    }
}

impl From<LcidDlSch> for u8 {
    fn from(lcid: LcidDlSch) -> u8 {
        lcid.0
    }
}

impl fmt::Display for LcidDlSch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::TA_CMD => f.write_str("TA_CMD"),
            Self::UE_CON_RES_ID => f.write_str("CON_RES_ID"),
            Self::PADDING => f.write_str("PADDING"),
            Self::INVALID => f.write_str("INVALID"),
            lcid => match lcid.to_lcid() {
                Some(rb) => fmt::Display::fmt(&rb, f),
                None => write!(f, "CE{}", lcid.0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcid_range() {
        assert_eq!(Lcid::new(32), Some(Lcid::MAX));
        assert_eq!(Lcid::new(33), None);
        assert_eq!(Lcid::try_from(40u8), Err(IdentifierError::Lcid(40)));
        assert!(Lcid::SRB3.is_srb());
        assert!(Lcid::MIN_DRB.is_drb());
        assert_eq!(Lcid::iter().count(), MAX_NOF_RB_LCIDS);
    }

    #[test]
    fn test_lcg_range() {
        assert!(LcgId::new(7).is_some());
        assert!(LcgId::new(8).is_none());
        assert_eq!(LcgId::iter().count(), MAX_NOF_LCGS);
    }

    #[test]
    fn test_dl_sch_classification() {
        assert!(LcidDlSch::from(Lcid::SRB1).is_sdu());
        assert!(LcidDlSch::TA_CMD.is_ce());
        assert!(!LcidDlSch::PADDING.is_ce());
        assert!(!LcidDlSch::INVALID.is_valid());
        assert!(LcidDlSch::SP_SRS_ACTIV.is_var_len_ce());
        assert_eq!(LcidDlSch::SP_SRS_ACTIV.sizeof_ce(), None);
        assert_eq!(LcidDlSch::UE_CON_RES_ID.sizeof_ce(), Some(6));
        assert_eq!(LcidDlSch::TA_CMD.sizeof_ce(), Some(1));
        assert_eq!(LcidDlSch::DRX_CMD.sizeof_ce(), Some(0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Lcid::SRB1.to_string(), "SRB1");
        assert_eq!(Lcid::MIN_DRB.to_string(), "LCID4");
        assert_eq!(LcidDlSch::TA_CMD.to_string(), "TA_CMD");
        assert_eq!(LcidDlSch::from(Lcid::SRB0).to_string(), "SRB0");
    }
}
