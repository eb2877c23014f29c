//! BSR and SR ingestion, UL grant accounting and UL queries.

use crate::mac::{LcgId, RanSliceId, UlBsrIndication, MAX_BSR_BYTES, MAX_SHORT_BSR_RELIABLE_BYTES};
use crate::qos::BitRate;
use crate::soa::RowId;

use super::slice::{apply_slice_delta, Direction};
use super::state::SystemState;

impl SystemState {
    pub(super) fn handle_bsr_indication(&mut self, row: RowId, bsr: &UlBsrIndication) {
        let (ctx, _, ul, _, groups) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;
        for report in &bsr.reported_lcgs {
            let lcg = report.lcg_id;
            let Some(group) = groups.get_mut(lcg) else {
                tracing::warn!(%ue_index, %lcg, "BSR for unconfigured logical channel group");
                continue;
            };
            // A short BSR saturates above the threshold: if both the new and
            // the stored values are beyond it, the report says nothing new.
            if bsr.format.is_short()
                && report.nof_bytes >= MAX_SHORT_BSR_RELIABLE_BYTES
                && group.buf_st >= MAX_SHORT_BSR_RELIABLE_BYTES
            {
                tracing::trace!(%ue_index, %lcg, nof_bytes = report.nof_bytes, "Ignoring saturated short BSR");
                continue;
            }
            let old = group.slice_contribution(ul.fallback);
            group.buf_st = report.nof_bytes.min(MAX_BSR_BYTES);
            group.sched_bytes_accum = 0;
            let new = group.slice_contribution(ul.fallback);
            if let Some(slice_id) = group.slice_id {
                apply_slice_delta(&mut ul.slices, &mut self.directory, Direction::Ul, ue_index, slice_id, old, new);
            }
        }
    }

    pub(super) fn set_pending_sr(&mut self, row: RowId, pending: bool) {
        self.ues.at_mut(row).2.pending_sr = pending;
    }

    pub(super) fn has_pending_sr(&self, row: RowId) -> bool {
        self.ues.at(row).2.pending_sr
    }

    /// Spreads a UL grant over the groups with pending data, lowest LCG first.
    /// Clears the pending SR. Returns the bytes matched against pending data.
    pub(super) fn handle_ul_grant(&mut self, row: RowId, grant_bytes: u32) -> u32 {
        let (ctx, _, ul, _, groups) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;
        ul.pending_sr = false;

        let mut remaining = grant_bytes;
        for lcg in groups.lcgs() {
            if remaining == 0 {
                break;
            }
            if !ul.is_eligible(lcg) {
                continue;
            }
            let Some(group) = groups.get_mut(lcg) else {
                continue;
            };
            let alloc = group.pending_bytes().min(remaining);
            if alloc == 0 {
                continue;
            }
            let old = group.slice_contribution(ul.fallback);
            group.sched_bytes_accum += alloc;
            let new = group.slice_contribution(ul.fallback);
            if let Some(slice_id) = group.slice_id {
                apply_slice_delta(&mut ul.slices, &mut self.directory, Direction::Ul, ue_index, slice_id, old, new);
            }
            if let Some(qos) = group.qos {
                self.ul_qos.record_scheduled(qos, alloc);
            }
            remaining -= alloc;
        }
        tracing::trace!(%ue_index, grant_bytes, unused = remaining, "UL grant accounted");
        grant_bytes - remaining
    }

    pub(super) fn pending_bytes_lcg(&self, row: RowId, lcg: LcgId) -> u32 {
        let (_, _, ul, _, groups) = self.ues.at(row);
        if !ul.is_eligible(lcg) {
            return 0;
        }
        groups.get(lcg).map_or(0, |group| group.pending_bytes())
    }

    /// A pending SR without any reported data counts as
    /// `sr_grant_bytes` of demand.
    pub(super) fn total_ul_pending_bytes(&self, row: RowId) -> u32 {
        let (_, _, ul, _, groups) = self.ues.at(row);
        let total: u32 = groups
            .iter()
            .filter(|(lcg, _)| ul.is_eligible(*lcg))
            .map(|(_, group)| group.pending_bytes())
            .fold(0u32, u32::saturating_add);
        if total == 0 && ul.pending_sr {
            self.policy.sr_grant_bytes
        } else {
            total
        }
    }

    pub(super) fn ul_pending_bytes_for_slice(&self, row: RowId, slice_id: RanSliceId) -> u32 {
        let ul = self.ues.at(row).2;
        if ul.fallback {
            return 0;
        }
        ul.slices.get(slice_id).unwrap_or(0)
    }

    pub(super) fn average_ul_bit_rate(&self, row: RowId, lcg: LcgId) -> Option<BitRate> {
        let (ctx, _, _, _, groups) = self.ues.at(row);
        let qos = groups.get(lcg)?.qos?;
        let bytes_per_slot = self.ul_qos.average_bytes_per_slot(qos)?;
        Some(BitRate::from_bytes_per_slot(bytes_per_slot, ctx.slots_per_ms))
    }
}
