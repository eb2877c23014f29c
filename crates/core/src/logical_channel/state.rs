use arrayvec::ArrayVec;

use crate::config::{AllocationPolicy, LogicalChannelConfigList, SystemConfig};
use crate::mac::{
    mac_sdu_required_bytes, LcgId, Lcid, MacCeInfo, RanSliceId, SlotPoint, UeIndex,
    MAX_NOF_LCGS, MAX_NOF_RB_LCIDS, UE_CON_RES_ID_CE_REQUIRED_BYTES,
};
use crate::qos::QosTracker;
use crate::soa::{RowId, Table};

use super::slice::{SlicePendingMap, UeDirectory};

pub(super) struct UeContext {
    pub ue_index: UeIndex,
    pub slots_per_ms: u32,
    pub channel_configs: Option<LogicalChannelConfigList>,
}

pub(super) struct UeDlContext {
    pub fallback: bool,
    pub pending_con_res_id: bool,
    /// Required bytes of the queued CEs, ConRes excluded.
    pub pending_ce_bytes: u32,
    pub nof_pending_ces: usize,
    pub ce_head: Option<RowId>,
    pub ce_tail: Option<RowId>,
    pub slices: SlicePendingMap,
    /// Configured channels, highest priority first.
    pub sorted_channels: ArrayVec<Lcid, MAX_NOF_RB_LCIDS>,
}

impl UeDlContext {
    pub fn new(fallback: bool) -> Self {
        UeDlContext {
            fallback,
            pending_con_res_id: false,
            pending_ce_bytes: 0,
            nof_pending_ces: 0,
            ce_head: None,
            ce_tail: None,
            slices: SlicePendingMap::default(),
            sorted_channels: ArrayVec::new(),
        }
    }

    pub fn pending_ce_bytes(&self) -> u32 {
        let con_res = if self.pending_con_res_id {
            UE_CON_RES_ID_CE_REQUIRED_BYTES
        } else {
            0
        };
        self.pending_ce_bytes + con_res
    }

    pub fn has_pending_ces(&self) -> bool {
        self.pending_con_res_id || self.ce_head.is_some()
    }

    /// Whether the channel may carry data in the current mode.
    pub fn is_eligible(&self, lcid: Lcid) -> bool {
        !self.fallback || lcid <= Lcid::SRB1
    }

    /// Bytes `lcid` adds to its slice aggregate in the given mode. Queued
    /// CEs count towards SRB1's slice.
    pub fn slice_contribution(&self, lcid: Lcid, ch: &DlChannelContext, fallback: bool) -> u32 {
        let sdu_bytes = ch.slice_contribution(fallback);
        if lcid == Lcid::SRB1 && !fallback && ch.slice_id.is_some() {
            sdu_bytes + self.pending_ce_bytes()
        } else {
            sdu_bytes
        }
    }
}

pub(super) struct UeUlContext {
    pub fallback: bool,
    pub pending_sr: bool,
    pub slices: SlicePendingMap,
}

impl UeUlContext {
    pub fn new(fallback: bool) -> Self {
        UeUlContext {
            fallback,
            pending_sr: false,
            slices: SlicePendingMap::default(),
        }
    }

    pub fn is_eligible(&self, lcg: LcgId) -> bool {
        !self.fallback || lcg.value() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DlChannelContext {
    pub active: bool,
    /// Bytes buffered in RLC, without MAC subheader.
    pub buf_st: u32,
    pub hol_toa: Option<SlotPoint>,
    pub qos: Option<RowId>,
    pub slice_id: Option<RanSliceId>,
}

impl DlChannelContext {
    pub fn new() -> Self {
        DlChannelContext {
            active: true,
            buf_st: 0,
            hol_toa: None,
            qos: None,
            slice_id: None,
        }
    }

    /// Buffered bytes plus MAC subheader.
    pub fn pending_bytes(&self) -> u32 {
        if self.active {
            mac_sdu_required_bytes(self.buf_st)
        } else {
            0
        }
    }

    /// Bytes this channel adds to its slice aggregate.
    pub fn slice_contribution(&self, fallback: bool) -> u32 {
        if fallback || self.slice_id.is_none() {
            0
        } else {
            self.pending_bytes()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct UlGroupContext {
    pub active: bool,
    pub nof_channels: u8,
    /// Last reported buffer size.
    pub buf_st: u32,
    /// Bytes granted since the last BSR was applied.
    pub sched_bytes_accum: u32,
    pub qos: Option<RowId>,
    pub slice_id: Option<RanSliceId>,
}

impl UlGroupContext {
    pub fn new(nof_channels: u8) -> Self {
        UlGroupContext {
            active: true,
            nof_channels,
            buf_st: 0,
            sched_bytes_accum: 0,
            qos: None,
            slice_id: None,
        }
    }

    pub fn pending_bytes(&self) -> u32 {
        if self.active {
            self.buf_st.saturating_sub(self.sched_bytes_accum)
        } else {
            0
        }
    }

    pub fn slice_contribution(&self, fallback: bool) -> u32 {
        if fallback || self.slice_id.is_none() {
            0
        } else {
            self.pending_bytes()
        }
    }
}

/// DL channel contexts indexed by LCID.
pub(super) struct DlChannelMap {
    channels: [Option<DlChannelContext>; MAX_NOF_RB_LCIDS],
}

impl Default for DlChannelMap {
    fn default() -> Self {
        DlChannelMap {
            channels: [None; MAX_NOF_RB_LCIDS],
        }
    }
}

impl DlChannelMap {
    pub fn get(&self, lcid: Lcid) -> Option<&DlChannelContext> {
        self.channels[lcid.index()].as_ref()
    }

    pub fn get_mut(&mut self, lcid: Lcid) -> Option<&mut DlChannelContext> {
        self.channels[lcid.index()].as_mut()
    }

    pub fn contains(&self, lcid: Lcid) -> bool {
        self.channels[lcid.index()].is_some()
    }

    pub fn insert(&mut self, lcid: Lcid, channel: DlChannelContext) {
        self.channels[lcid.index()] = Some(channel);
    }

    pub fn remove(&mut self, lcid: Lcid) -> Option<DlChannelContext> {
        self.channels[lcid.index()].take()
    }

    pub fn lcids(&self) -> ArrayVec<Lcid, MAX_NOF_RB_LCIDS> {
        Lcid::iter().filter(|lcid| self.contains(*lcid)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lcid, &DlChannelContext)> {
        Lcid::iter().zip(self.channels.iter()).filter_map(|(lcid, ch)| ch.as_ref().map(|ch| (lcid, ch)))
    }
}

/// UL group contexts indexed by LCG id.
pub(super) struct UlGroupMap {
    groups: [Option<UlGroupContext>; MAX_NOF_LCGS],
}

impl Default for UlGroupMap {
    fn default() -> Self {
        UlGroupMap {
            groups: [None; MAX_NOF_LCGS],
        }
    }
}

impl UlGroupMap {
    pub fn get(&self, lcg: LcgId) -> Option<&UlGroupContext> {
        self.groups[lcg.index()].as_ref()
    }

    pub fn get_mut(&mut self, lcg: LcgId) -> Option<&mut UlGroupContext> {
        self.groups[lcg.index()].as_mut()
    }

    pub fn contains(&self, lcg: LcgId) -> bool {
        self.groups[lcg.index()].is_some()
    }

    pub fn insert(&mut self, lcg: LcgId, group: UlGroupContext) {
        self.groups[lcg.index()] = Some(group);
    }

    pub fn remove(&mut self, lcg: LcgId) -> Option<UlGroupContext> {
        self.groups[lcg.index()].take()
    }

    pub fn lcgs(&self) -> ArrayVec<LcgId, MAX_NOF_LCGS> {
        LcgId::iter().filter(|lcg| self.contains(*lcg)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LcgId, &UlGroupContext)> {
        LcgId::iter().zip(self.groups.iter()).filter_map(|(lcg, g)| g.as_ref().map(|g| (lcg, g)))
    }
}

pub(super) type UeTable = Table<(
    Vec<UeContext>,
    Vec<UeDlContext>,
    Vec<UeUlContext>,
    Vec<DlChannelMap>,
    Vec<UlGroupMap>,
)>;

/// Pending MAC CEs of all UEs; the second column links to the next CE of
/// the same UE.
pub(super) type CeTable = Table<(Vec<MacCeInfo>, Vec<Option<RowId>>)>;

/// Everything the logical channel system owns, shared by the system handle
/// and the UE repositories.
pub(crate) struct SystemState {
    pub(super) policy: AllocationPolicy,
    pub(super) ues: UeTable,
    pub(super) ces: CeTable,
    pub(super) dl_qos: QosTracker,
    pub(super) ul_qos: QosTracker,
    pub(super) directory: UeDirectory,
}

impl SystemState {
    pub(super) fn new(config: &SystemConfig) -> Self {
        SystemState {
            policy: config.policy.clone(),
            ues: Table::with_capacity(config.max_ues),
            ces: Table::with_capacity(config.max_pending_ces),
            dl_qos: QosTracker::with_capacity(config.max_qos_channels),
            ul_qos: QosTracker::with_capacity(config.max_qos_channels),
            directory: UeDirectory::with_capacity(config.max_ues),
        }
    }

    pub(super) fn slot_indication(&mut self) {
        self.dl_qos.slot_indication();
        self.ul_qos.slot_indication();
    }
}
