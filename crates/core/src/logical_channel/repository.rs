use std::{cell::RefCell, fmt, rc::Rc};

use arrayvec::ArrayVec;

use crate::config::LogicalChannelConfigList;
use crate::mac::{
    DlMsgLcInfo, DlMsgTbInfo, LcgId, Lcid, MacCeInfo, RanSliceId, SlotPoint, UeIndex,
    UlBsrIndication, MAX_NOF_RB_LCIDS,
};
use crate::qos::BitRate;
use crate::soa::RowId;

use super::state::SystemState;
use super::LogicalChannelError;

/// Access to the logical channels of one UE.
///
/// Not `Clone`: the repository is the only accessor of the UE's rows and
/// removes them when dropped.
pub struct UeLogicalChannelRepository {
    state: Rc<RefCell<SystemState>>,
    row: RowId,
    ue_index: UeIndex,
}

impl UeLogicalChannelRepository {
    pub(super) fn new(state: Rc<RefCell<SystemState>>, row: RowId, ue_index: UeIndex) -> Self {
        UeLogicalChannelRepository {
            state,
            row,
            ue_index,
        }
    }

    pub fn ue_index(&self) -> UeIndex {
        self.ue_index
    }

    /// Replaces the channel configuration. Channels and groups missing from
    /// `configs` are deleted, new ones are created active.
    pub fn configure(&mut self, configs: LogicalChannelConfigList) -> Result<(), LogicalChannelError> {
        self.state.borrow_mut().configure(self.row, configs)
    }

    pub fn channel_configs(&self) -> Option<LogicalChannelConfigList> {
        self.state.borrow().ues.at(self.row).0.channel_configs.clone()
    }

    /// Drops all pending data, CEs and slice bindings. Channels stay
    /// configured but inactive until the next [`configure`](Self::configure).
    pub fn deactivate(&mut self) {
        self.state.borrow_mut().deactivate(self.row);
    }

    pub fn set_fallback_state(&mut self, enter: bool) {
        self.state.borrow_mut().set_fallback_state(self.row, enter);
    }

    pub fn is_fallback(&self) -> bool {
        self.state.borrow().ues.at(self.row).1.fallback
    }

    pub fn is_active(&self, lcid: Lcid) -> bool {
        self.state
            .borrow()
            .ues
            .at(self.row)
            .3
            .get(lcid)
            .is_some_and(|ch| ch.active)
    }

    /// Active channels, highest scheduling priority first.
    pub fn sorted_channels(&self) -> ArrayVec<Lcid, MAX_NOF_RB_LCIDS> {
        let state = self.state.borrow();
        let (_, dl, _, channels, _) = state.ues.at(self.row);
        dl.sorted_channels
            .iter()
            .copied()
            .filter(|lcid| channels.get(*lcid).is_some_and(|ch| ch.active))
            .collect()
    }

    pub fn set_lcid_ran_slice(&mut self, lcid: Lcid, slice_id: RanSliceId) {
        self.state.borrow_mut().set_lcid_ran_slice(self.row, lcid, slice_id);
    }

    pub fn set_lcg_ran_slice(&mut self, lcg: LcgId, slice_id: RanSliceId) {
        self.state.borrow_mut().set_lcg_ran_slice(self.row, lcg, slice_id);
    }

    pub fn deregister_lc_ran_slice(&mut self, lcid: Lcid) {
        self.state.borrow_mut().deregister_lc_ran_slice(self.row, lcid);
    }

    pub fn deregister_lcg_ran_slice(&mut self, lcg: LcgId) {
        self.state.borrow_mut().deregister_lcg_ran_slice(self.row, lcg);
    }

    pub fn lcid_ran_slice(&self, lcid: Lcid) -> Option<RanSliceId> {
        self.state.borrow().ues.at(self.row).3.get(lcid)?.slice_id
    }

    pub fn lcg_ran_slice(&self, lcg: LcgId) -> Option<RanSliceId> {
        self.state.borrow().ues.at(self.row).4.get(lcg)?.slice_id
    }

    /// Reported RLC buffer occupancy of `lcid`, clamped to
    /// [`MAX_DL_BUFFER_STATUS`](super::MAX_DL_BUFFER_STATUS).
    pub fn handle_dl_buffer_status_indication(&mut self, lcid: Lcid, bytes: u32, hol_toa: Option<SlotPoint>) {
        self.state
            .borrow_mut()
            .handle_dl_buffer_status(self.row, lcid, bytes, hol_toa);
    }

    pub fn handle_mac_ce_indication(&mut self, ce: MacCeInfo) {
        self.state.borrow_mut().handle_mac_ce_indication(self.row, ce);
    }

    pub fn handle_bsr_indication(&mut self, bsr: &UlBsrIndication) {
        self.state.borrow_mut().handle_bsr_indication(self.row, bsr);
    }

    pub fn handle_sr_indication(&mut self) {
        self.state.borrow_mut().set_pending_sr(self.row, true);
    }

    pub fn reset_sr_indication(&mut self) {
        self.state.borrow_mut().set_pending_sr(self.row, false);
    }

    pub fn has_pending_sr(&self) -> bool {
        self.state.borrow().has_pending_sr(self.row)
    }

    pub fn handle_ul_grant(&mut self, grant_bytes: u32) -> u32 {
        self.state.borrow_mut().handle_ul_grant(self.row, grant_bytes)
    }

    pub fn allocate_ue_con_res_id_mac_ce(&mut self, subpdu: &mut DlMsgLcInfo, rem_bytes: u32) -> u32 {
        self.state
            .borrow_mut()
            .allocate_con_res_ce(self.row, subpdu, rem_bytes)
    }

    pub fn allocate_mac_ce(&mut self, subpdu: &mut DlMsgLcInfo, rem_bytes: u32) -> u32 {
        self.state.borrow_mut().allocate_mac_ce(self.row, subpdu, rem_bytes)
    }

    pub fn allocate_mac_sdu(&mut self, subpdu: &mut DlMsgLcInfo, rem_bytes: u32, lcid: Option<Lcid>) -> u32 {
        self.state
            .borrow_mut()
            .allocate_mac_sdu(self.row, subpdu, rem_bytes, lcid)
    }

    pub fn allocate_mac_ces(&mut self, tb: &mut DlMsgTbInfo, rem_bytes: u32) -> u32 {
        self.state.borrow_mut().allocate_mac_ces(self.row, tb, rem_bytes)
    }

    pub fn allocate_mac_sdus(&mut self, tb: &mut DlMsgTbInfo, rem_bytes: u32, lcid: Option<Lcid>) -> u32 {
        self.state
            .borrow_mut()
            .allocate_mac_sdus(self.row, tb, rem_bytes, lcid)
    }

    pub fn build_dl_transport_block_info(&mut self, tb: &mut DlMsgTbInfo, rem_bytes: u32) -> u32 {
        self.state
            .borrow_mut()
            .build_dl_transport_block_info(self.row, tb, rem_bytes)
    }

    /// Pending bytes of `lcid` including the MAC subheader.
    pub fn pending_bytes(&self, lcid: Lcid) -> u32 {
        self.state.borrow().dl_pending_bytes(self.row, lcid)
    }

    pub fn has_pending_bytes(&self, lcid: Lcid) -> bool {
        self.pending_bytes(lcid) > 0
    }

    pub fn pending_ce_bytes(&self) -> u32 {
        self.state.borrow().pending_ce_bytes(self.row)
    }

    pub fn has_pending_ces(&self) -> bool {
        self.state.borrow().has_pending_ces(self.row)
    }

    pub fn total_dl_pending_bytes(&self) -> u32 {
        self.state.borrow().total_dl_pending_bytes(self.row)
    }

    pub fn has_dl_pending_bytes(&self) -> bool {
        self.total_dl_pending_bytes() > 0
    }

    pub fn dl_pending_bytes(&self, slice_id: RanSliceId) -> u32 {
        self.state
            .borrow()
            .dl_pending_bytes_for_slice(self.row, slice_id)
    }

    pub fn has_dl_pending_bytes_for_slice(&self, slice_id: RanSliceId) -> bool {
        self.dl_pending_bytes(slice_id) > 0
    }

    pub fn hol_toa(&self, lcid: Lcid) -> Option<SlotPoint> {
        self.state.borrow().hol_toa(self.row, lcid)
    }

    pub fn average_dl_bit_rate(&self, lcid: Lcid) -> Option<BitRate> {
        self.state.borrow().average_dl_bit_rate(self.row, lcid)
    }

    pub fn pending_bytes_lcg(&self, lcg: LcgId) -> u32 {
        self.state.borrow().pending_bytes_lcg(self.row, lcg)
    }

    pub fn total_ul_pending_bytes(&self) -> u32 {
        self.state.borrow().total_ul_pending_bytes(self.row)
    }

    pub fn has_ul_pending_bytes(&self) -> bool {
        self.total_ul_pending_bytes() > 0
    }

    pub fn ul_pending_bytes(&self, slice_id: RanSliceId) -> u32 {
        self.state
            .borrow()
            .ul_pending_bytes_for_slice(self.row, slice_id)
    }

    pub fn has_ul_pending_bytes_for_slice(&self, slice_id: RanSliceId) -> bool {
        self.ul_pending_bytes(slice_id) > 0
    }

    pub fn average_ul_bit_rate(&self, lcg: LcgId) -> Option<BitRate> {
        self.state.borrow().average_ul_bit_rate(self.row, lcg)
    }
}

impl fmt::Debug for UeLogicalChannelRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UeLogicalChannelRepository")
            .field("ue_index", &self.ue_index)
            .field("row", &self.row)
            .finish()
    }
}

impl Drop for UeLogicalChannelRepository {
    fn drop(&mut self) {
        // Tables may be mid-update when a panic unwinds through them.
        if std::thread::panicking() {
            return;
        }
        match self.state.try_borrow_mut() {
            Ok(mut state) => state.remove_ue(self.row),
            Err(_) => {
                tracing::error!(ue_index = %self.ue_index, "UE dropped while system state is borrowed, rows leaked")
            }
        }
    }
}
