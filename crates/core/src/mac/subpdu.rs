use arrayvec::ArrayVec;
use serde::Serialize;

use super::ce::MacCePayload;
use super::lcid::LcidDlSch;

/// Maximum number of subPDUs the DL transport block builder fills in.
pub const MAX_SUBPDUS_PER_TB: usize = 8;

/// One scheduled MAC subPDU of a DL transport block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DlMsgLcInfo {
    pub lcid: LcidDlSch,
    /// Payload bytes, without subheader.
    pub sched_bytes: u32,
    pub ce_payload: Option<MacCePayload>,
}

impl Default for DlMsgLcInfo {
    fn default() -> Self {
        DlMsgLcInfo {
            lcid: LcidDlSch::INVALID,
            sched_bytes: 0,
            ce_payload: None,
        }
    }
}

impl DlMsgLcInfo {
    pub fn is_valid(&self) -> bool {
        self.lcid.is_valid() && (self.sched_bytes > 0 || self.lcid.is_ce())
    }

    pub fn reset(&mut self) {
        *self = DlMsgLcInfo::default();
    }
}

/// SubPDUs of one DL transport block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DlMsgTbInfo {
    pub subpdus: ArrayVec<DlMsgLcInfo, MAX_SUBPDUS_PER_TB>,
}

impl DlMsgTbInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.subpdus.is_full()
    }

    pub fn len(&self) -> usize {
        self.subpdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subpdus.is_empty()
    }

    /// Adds a subPDU, returning `false` when the block is full.
    pub fn push(&mut self, subpdu: DlMsgLcInfo) -> bool {
        self.subpdus.try_push(subpdu).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DlMsgLcInfo> {
        self.subpdus.iter()
    }
}
