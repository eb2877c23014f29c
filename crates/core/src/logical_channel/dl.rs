//! DL buffer status and MAC CE ingestion, subPDU allocation and DL queries.

use crate::mac::{
    mac_ce_required_bytes, mac_sdu_payload_size, DlMsgLcInfo, DlMsgTbInfo, Lcid, LcidDlSch,
    MacCeInfo, RanSliceId, SlotPoint, UeIndex, MAC_SDU_SUBHEADER_LENGTH_THRES, MIN_MAC_SDU_SUBHEADER_SIZE,
    UE_CON_RES_ID_CE_REQUIRED_BYTES, UE_CON_RES_ID_LEN,
};
use crate::qos::BitRate;
use crate::soa::RowId;

use super::slice::{apply_slice_delta, Direction, UeDirectory};
use super::state::{DlChannelMap, SystemState, UeDlContext};

/// Buffer status reports are clamped to this many bytes.
pub const MAX_DL_BUFFER_STATUS: u32 = 1 << 24;

/// Total subPDU size whose length field cannot be encoded: 255 payload bytes
/// fit a 2-byte subheader, 256 need 3 bytes.
const INVALID_SUBPDU_SIZE: u32 = MAC_SDU_SUBHEADER_LENGTH_THRES + MIN_MAC_SDU_SUBHEADER_SIZE;

impl SystemState {
    pub(super) fn handle_dl_buffer_status(
        &mut self,
        row: RowId,
        lcid: Lcid,
        bytes: u32,
        hol_toa: Option<SlotPoint>,
    ) {
        let (ctx, dl, _, channels, _) = self.ues.at_mut(row);
        let Some(ch) = channels.get_mut(lcid) else {
            tracing::warn!(ue_index = %ctx.ue_index, %lcid, "DL buffer status for unconfigured logical channel");
            return;
        };
        let old = dl.slice_contribution(lcid, ch, dl.fallback);
        ch.buf_st = bytes.min(MAX_DL_BUFFER_STATUS);
        ch.hol_toa = if ch.buf_st > 0 { hol_toa } else { None };
        let new = dl.slice_contribution(lcid, ch, dl.fallback);
        if let Some(slice_id) = ch.slice_id {
            apply_slice_delta(&mut dl.slices, &mut self.directory, Direction::Dl, ctx.ue_index, slice_id, old, new);
        }
    }

    pub(super) fn handle_mac_ce_indication(&mut self, row: RowId, ce: MacCeInfo) {
        let (ctx, dl, _, channels, _) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;
        let old_ce_bytes = dl.pending_ce_bytes();

        if ce.lcid == LcidDlSch::UE_CON_RES_ID {
            dl.pending_con_res_id = true;
            self.directory.set_pending_ces(ue_index, true);
            apply_ce_delta(dl, channels, &mut self.directory, ue_index, old_ce_bytes);
            return;
        }
        if !ce.lcid.is_ce() {
            tracing::warn!(%ue_index, lcid = %ce.lcid, "Discarding MAC CE with non-CE LCID");
            return;
        }

        if ce.lcid == LcidDlSch::TA_CMD {
            // Only the latest TA command matters and its size is fixed.
            let mut next = dl.ce_head;
            while let Some(ce_row) = next {
                let (queued, link) = self.ces.at_mut(ce_row);
                if queued.lcid == LcidDlSch::TA_CMD {
                    *queued = ce;
                    return;
                }
                next = *link;
            }
        }

        if dl.nof_pending_ces >= self.policy.max_ces_per_ue {
            tracing::warn!(
                %ue_index,
                lcid = %ce.lcid,
                nof_pending_ces = dl.nof_pending_ces,
                "MAC CE queue full, discarding CE"
            );
            return;
        }

        let ce_row = self.ces.insert((ce, None));
        match dl.ce_tail {
            Some(tail) => *self.ces.at_mut(tail).1 = Some(ce_row),
            None => dl.ce_head = Some(ce_row),
        }
        dl.ce_tail = Some(ce_row);
        dl.nof_pending_ces += 1;
        dl.pending_ce_bytes += mac_ce_required_bytes(&ce);
        self.directory.set_pending_ces(ue_index, true);
        apply_ce_delta(dl, channels, &mut self.directory, ue_index, old_ce_bytes);
    }

    pub(super) fn allocate_con_res_ce(&mut self, row: RowId, subpdu: &mut DlMsgLcInfo, rem_bytes: u32) -> u32 {
        subpdu.reset();
        let (ctx, dl, _, channels, _) = self.ues.at_mut(row);
        if !dl.pending_con_res_id || rem_bytes < UE_CON_RES_ID_CE_REQUIRED_BYTES {
            return 0;
        }
        let old_ce_bytes = dl.pending_ce_bytes();
        dl.pending_con_res_id = false;
        self.directory.set_pending_ces(ctx.ue_index, dl.has_pending_ces());
        apply_ce_delta(dl, channels, &mut self.directory, ctx.ue_index, old_ce_bytes);

        let ce = MacCeInfo::con_res_id();
        subpdu.lcid = ce.lcid;
        subpdu.sched_bytes = UE_CON_RES_ID_LEN;
        subpdu.ce_payload = Some(ce.payload);
        tracing::trace!(ue_index = %ctx.ue_index, "ConRes CE allocated");
        UE_CON_RES_ID_CE_REQUIRED_BYTES
    }

    pub(super) fn allocate_mac_ce(&mut self, row: RowId, subpdu: &mut DlMsgLcInfo, rem_bytes: u32) -> u32 {
        if self.ues.at(row).1.pending_con_res_id {
            return self.allocate_con_res_ce(row, subpdu, rem_bytes);
        }
        subpdu.reset();
        let (ctx, dl, _, channels, _) = self.ues.at_mut(row);
        let Some(head) = dl.ce_head else {
            return 0;
        };
        let (ce, next) = self.ces.at(head);
        let (ce, next) = (*ce, *next);
        let required = mac_ce_required_bytes(&ce);
        if required > rem_bytes {
            return 0;
        }

        let old_ce_bytes = dl.pending_ce_bytes();
        self.ces.erase(head);
        dl.ce_head = next;
        if next.is_none() {
            dl.ce_tail = None;
        }
        dl.nof_pending_ces -= 1;
        dl.pending_ce_bytes -= required;
        self.directory.set_pending_ces(ctx.ue_index, dl.has_pending_ces());
        apply_ce_delta(dl, channels, &mut self.directory, ctx.ue_index, old_ce_bytes);

        subpdu.lcid = ce.lcid;
        subpdu.sched_bytes = ce.payload_size();
        subpdu.ce_payload = Some(ce.payload);
        tracing::trace!(ue_index = %ctx.ue_index, lcid = %ce.lcid, required, "MAC CE allocated");
        required
    }

    /// Allocates one SDU subPDU for `lcid`, or for the highest priority channel
    /// with pending data if `lcid` is `None`. Returns the subPDU size
    /// including subheader.
    pub(super) fn allocate_mac_sdu(
        &mut self,
        row: RowId,
        subpdu: &mut DlMsgLcInfo,
        rem_bytes: u32,
        lcid: Option<Lcid>,
    ) -> u32 {
        subpdu.reset();
        if rem_bytes <= MIN_MAC_SDU_SUBHEADER_SIZE {
            return 0;
        }
        let (ctx, dl, _, channels, _) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;
        let Some(lcid) = lcid.or_else(|| highest_priority_pending(dl, channels)) else {
            return 0;
        };
        if !dl.is_eligible(lcid) {
            return 0;
        }
        let other_pending = dl
            .sorted_channels
            .iter()
            .any(|other| *other != lcid && channel_pending_bytes(dl, channels, *other) > 0);
        let Some(ch) = channels.get_mut(lcid) else {
            tracing::warn!(%ue_index, %lcid, "SDU allocation for unconfigured logical channel");
            return 0;
        };
        let pending = ch.pending_bytes();
        if pending == 0 {
            return 0;
        }

        let mut alloc_bytes = rem_bytes.min(pending);
        let leftover = rem_bytes - alloc_bytes;
        if leftover > 0 && (leftover < self.policy.leftover_fold_threshold || !other_pending) {
            alloc_bytes = rem_bytes;
        }
        if alloc_bytes == INVALID_SUBPDU_SIZE {
            alloc_bytes -= 1;
        }
        let sdu_size = mac_sdu_payload_size(alloc_bytes);

        let old = dl.slice_contribution(lcid, ch, dl.fallback);
        ch.buf_st -= ch.buf_st.min(sdu_size);
        if ch.buf_st > 0 && lcid != Lcid::SRB0 {
            // Room for the RLC header of the next segment.
            ch.buf_st += self.policy.rlc_segmentation_overhead;
        }
        if ch.buf_st == 0 {
            ch.hol_toa = None;
        }
        let new = dl.slice_contribution(lcid, ch, dl.fallback);
        if let Some(slice_id) = ch.slice_id {
            apply_slice_delta(&mut dl.slices, &mut self.directory, Direction::Dl, ue_index, slice_id, old, new);
        }
        if let Some(qos) = ch.qos {
            self.dl_qos.record_scheduled(qos, alloc_bytes);
        }

        subpdu.lcid = lcid.into();
        subpdu.sched_bytes = sdu_size;
        tracing::trace!(%ue_index, %lcid, alloc_bytes, sdu_size, remaining = ch.buf_st, "MAC SDU allocated");
        alloc_bytes
    }

    pub(super) fn allocate_mac_ces(&mut self, row: RowId, tb: &mut DlMsgTbInfo, rem_bytes: u32) -> u32 {
        let mut total = 0;
        while !tb.is_full() && total < rem_bytes {
            let mut subpdu = DlMsgLcInfo::default();
            let alloc = self.allocate_mac_ce(row, &mut subpdu, rem_bytes - total);
            if alloc == 0 {
                break;
            }
            tb.push(subpdu);
            total += alloc;
        }
        total
    }

    /// An explicit `lcid` yields at most one subPDU.
    pub(super) fn allocate_mac_sdus(
        &mut self,
        row: RowId,
        tb: &mut DlMsgTbInfo,
        rem_bytes: u32,
        lcid: Option<Lcid>,
    ) -> u32 {
        let mut total = 0;
        while !tb.is_full() && total < rem_bytes {
            let mut subpdu = DlMsgLcInfo::default();
            let alloc = self.allocate_mac_sdu(row, &mut subpdu, rem_bytes - total, lcid);
            if alloc == 0 {
                break;
            }
            tb.push(subpdu);
            total += alloc;
            if lcid.is_some() {
                break;
            }
        }
        total
    }

    /// CEs first, then SDUs in priority order.
    pub(super) fn build_dl_transport_block_info(&mut self, row: RowId, tb: &mut DlMsgTbInfo, rem_bytes: u32) -> u32 {
        let ce_bytes = self.allocate_mac_ces(row, tb, rem_bytes);
        ce_bytes + self.allocate_mac_sdus(row, tb, rem_bytes - ce_bytes, None)
    }

    pub(super) fn dl_pending_bytes(&self, row: RowId, lcid: Lcid) -> u32 {
        let (_, dl, _, channels, _) = self.ues.at(row);
        channel_pending_bytes(dl, channels, lcid)
    }

    pub(super) fn pending_ce_bytes(&self, row: RowId) -> u32 {
        self.ues.at(row).1.pending_ce_bytes()
    }

    pub(super) fn has_pending_ces(&self, row: RowId) -> bool {
        self.ues.at(row).1.has_pending_ces()
    }

    pub(super) fn total_dl_pending_bytes(&self, row: RowId) -> u32 {
        let (_, dl, _, channels, _) = self.ues.at(row);
        let sdu_bytes: u32 = channels
            .iter()
            .filter(|(lcid, _)| dl.is_eligible(*lcid))
            .map(|(_, ch)| ch.pending_bytes())
            .fold(0u32, u32::saturating_add);
        sdu_bytes.saturating_add(dl.pending_ce_bytes())
    }

    /// Pending bytes of the channels bound to `slice_id`. CE bytes count
    /// towards the slice SRB1 is bound to.
    pub(super) fn dl_pending_bytes_for_slice(&self, row: RowId, slice_id: RanSliceId) -> u32 {
        let dl = self.ues.at(row).1;
        if dl.fallback {
            return 0;
        }
        dl.slices.get(slice_id).unwrap_or(0)
    }

    pub(super) fn hol_toa(&self, row: RowId, lcid: Lcid) -> Option<SlotPoint> {
        self.ues.at(row).3.get(lcid).and_then(|ch| ch.hol_toa)
    }

    pub(super) fn average_dl_bit_rate(&self, row: RowId, lcid: Lcid) -> Option<BitRate> {
        let (ctx, _, _, channels, _) = self.ues.at(row);
        let qos = channels.get(lcid)?.qos?;
        let bytes_per_slot = self.dl_qos.average_bytes_per_slot(qos)?;
        Some(BitRate::from_bytes_per_slot(bytes_per_slot, ctx.slots_per_ms))
    }
}

/// Moves the aggregate of SRB1's slice after the CE queue changed size from
/// `old_ce_bytes`.
pub(super) fn apply_ce_delta(
    dl: &mut UeDlContext,
    channels: &DlChannelMap,
    directory: &mut UeDirectory,
    ue_index: UeIndex,
    old_ce_bytes: u32,
) {
    if dl.fallback {
        return;
    }
    let Some(slice_id) = channels.get(Lcid::SRB1).and_then(|srb1| srb1.slice_id) else {
        return;
    };
    let new_ce_bytes = dl.pending_ce_bytes();
    apply_slice_delta(&mut dl.slices, directory, Direction::Dl, ue_index, slice_id, old_ce_bytes, new_ce_bytes);
}

fn channel_pending_bytes(dl: &UeDlContext, channels: &DlChannelMap, lcid: Lcid) -> u32 {
    if !dl.is_eligible(lcid) {
        return 0;
    }
    channels.get(lcid).map_or(0, |ch| ch.pending_bytes())
}

fn highest_priority_pending(dl: &UeDlContext, channels: &DlChannelMap) -> Option<Lcid> {
    dl.sorted_channels
        .iter()
        .copied()
        .find(|lcid| channel_pending_bytes(dl, channels, *lcid) > 0)
}
