//! UE creation, (re)configuration, deactivation and removal, plus binding of
//! channels and groups to RAN slices.

use arrayvec::ArrayVec;

use crate::config::{LogicalChannelConfig, LogicalChannelConfigList, MAX_GBR_AVERAGING_WINDOW_MS};
use crate::mac::{LcgId, Lcid, RanSliceId, SubcarrierSpacing, UeIndex, MAX_NOF_LCGS, MAX_NOF_RB_LCIDS};
use crate::soa::RowId;

use super::dl::apply_ce_delta;
use super::slice::{apply_slice_delta, Direction, SlicePendingMap, UeDirectory};
use super::state::{
    DlChannelContext, DlChannelMap, SystemState, UeContext, UeDlContext, UeUlContext,
    UlGroupContext, UlGroupMap,
};
use super::LogicalChannelError;

impl SystemState {
    pub(super) fn add_ue(
        &mut self,
        ue_index: UeIndex,
        scs: SubcarrierSpacing,
        starts_in_fallback: bool,
        configs: Option<LogicalChannelConfigList>,
    ) -> Result<RowId, LogicalChannelError> {
        if self.directory.contains(ue_index) {
            return Err(LogicalChannelError::DuplicateUeIndex(ue_index));
        }
        if let Some(configs) = &configs {
            validate_channel_configs(configs)?;
        }

        let row = self.ues.insert((
            UeContext {
                ue_index,
                slots_per_ms: scs.slots_per_ms(),
                channel_configs: None,
            },
            UeDlContext::new(starts_in_fallback),
            UeUlContext::new(starts_in_fallback),
            DlChannelMap::default(),
            UlGroupMap::default(),
        ));
        self.directory.register(ue_index);
        if let Some(configs) = configs {
            self.apply_config(row, configs);
        }
        tracing::debug!(%ue_index, %row, fallback = starts_in_fallback, "UE logical channels created");
        Ok(row)
    }

    pub(super) fn configure(
        &mut self,
        row: RowId,
        configs: LogicalChannelConfigList,
    ) -> Result<(), LogicalChannelError> {
        validate_channel_configs(&configs)?;
        self.apply_config(row, configs);
        Ok(())
    }

    fn apply_config(&mut self, row: RowId, configs: LogicalChannelConfigList) {
        let (ctx, dl, ul, channels, groups) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;
        let slots_per_ms = ctx.slots_per_ms;

        // Channels the new configuration no longer names.
        for lcid in channels.lcids() {
            if !configs.iter().any(|cfg| cfg.lcid == lcid) {
                detach_dl_slice(dl, channels, &mut self.directory, ue_index, lcid);
                if let Some(qos) = channels.remove(lcid).and_then(|ch| ch.qos) {
                    self.dl_qos.detach(qos);
                }
            }
        }

        for cfg in configs.iter() {
            if !channels.contains(cfg.lcid) {
                channels.insert(cfg.lcid, DlChannelContext::new());
            }
            let Some(ch) = channels.get_mut(cfg.lcid) else {
                continue;
            };
            if !ch.active {
                let old = dl.slice_contribution(cfg.lcid, ch, dl.fallback);
                ch.active = true;
                let new = dl.slice_contribution(cfg.lcid, ch, dl.fallback);
                if let Some(slice_id) = ch.slice_id {
                    apply_slice_delta(&mut dl.slices, &mut self.directory, Direction::Dl, ue_index, slice_id, old, new);
                }
            }
            match (cfg.gbr(), ch.qos) {
                (Some(gbr), Some(qos)) => {
                    self.dl_qos.set_window(qos, window_slots(gbr.average_window_ms, slots_per_ms))
                }
                (Some(gbr), None) => {
                    ch.qos = Some(self.dl_qos.attach(window_slots(gbr.average_window_ms, slots_per_ms)))
                }
                (None, Some(qos)) => {
                    self.dl_qos.detach(qos);
                    ch.qos = None;
                }
                (None, None) => {}
            }
        }

        // Member count and GBR averaging window of every group.
        let mut members = [0u8; MAX_NOF_LCGS];
        let mut gbr_window_ms = [None::<u32>; MAX_NOF_LCGS];
        for cfg in configs.iter() {
            let idx = cfg.lcg_id.index();
            members[idx] += 1;
            if let Some(gbr) = cfg.gbr() {
                let window = gbr_window_ms[idx].get_or_insert(0);
                *window = (*window).max(gbr.average_window_ms);
            }
        }

        for lcg in groups.lcgs() {
            if members[lcg.index()] == 0 {
                detach_ul_slice(ul, groups, &mut self.directory, ue_index, lcg);
                if let Some(qos) = groups.remove(lcg).and_then(|g| g.qos) {
                    self.ul_qos.detach(qos);
                }
            }
        }

        for lcg in LcgId::iter() {
            let nof_channels = members[lcg.index()];
            if nof_channels == 0 {
                continue;
            }
            if !groups.contains(lcg) {
                groups.insert(lcg, UlGroupContext::new(nof_channels));
            }
            let Some(group) = groups.get_mut(lcg) else {
                continue;
            };
            group.nof_channels = nof_channels;
            if !group.active {
                let old = group.slice_contribution(ul.fallback);
                group.active = true;
                let new = group.slice_contribution(ul.fallback);
                if let Some(slice_id) = group.slice_id {
                    apply_slice_delta(&mut ul.slices, &mut self.directory, Direction::Ul, ue_index, slice_id, old, new);
                }
            }
            match (gbr_window_ms[lcg.index()], group.qos) {
                (Some(window_ms), Some(qos)) => {
                    self.ul_qos.set_window(qos, window_slots(window_ms, slots_per_ms))
                }
                (Some(window_ms), None) => {
                    group.qos = Some(self.ul_qos.attach(window_slots(window_ms, slots_per_ms)))
                }
                (None, Some(qos)) => {
                    self.ul_qos.detach(qos);
                    group.qos = None;
                }
                (None, None) => {}
            }
        }

        dl.sorted_channels = sorted_channel_list(&configs);
        tracing::debug!(
            %ue_index,
            nof_channels = configs.len(),
            nof_groups = groups.lcgs().len(),
            "UE logical channels configured"
        );
        ctx.channel_configs = Some(configs);
    }

    /// Drops all pending data and slice bindings, keeping the configured
    /// channels and groups as inactive.
    pub(super) fn deactivate(&mut self, row: RowId) {
        let (ctx, dl, ul, channels, groups) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;

        let old_ce_bytes = dl.pending_ce_bytes();
        let mut next = dl.ce_head;
        while let Some(ce) = next {
            next = self.ces.take(ce).and_then(|(_, link)| link);
        }
        dl.ce_head = None;
        dl.ce_tail = None;
        dl.pending_ce_bytes = 0;
        dl.nof_pending_ces = 0;
        dl.pending_con_res_id = false;
        self.directory.set_pending_ces(ue_index, false);
        apply_ce_delta(dl, channels, &mut self.directory, ue_index, old_ce_bytes);

        for lcid in channels.lcids() {
            detach_dl_slice(dl, channels, &mut self.directory, ue_index, lcid);
            if let Some(ch) = channels.get_mut(lcid) {
                ch.active = false;
                ch.buf_st = 0;
                ch.hol_toa = None;
            }
        }
        debug_assert!(dl.slices.is_empty());

        for lcg in groups.lcgs() {
            detach_ul_slice(ul, groups, &mut self.directory, ue_index, lcg);
            if let Some(group) = groups.get_mut(lcg) {
                group.active = false;
                group.buf_st = 0;
                group.sched_bytes_accum = 0;
            }
        }
        debug_assert!(ul.slices.is_empty());
        ul.pending_sr = false;

        tracing::debug!(%ue_index, "UE logical channels deactivated");
    }

    pub(super) fn remove_ue(&mut self, row: RowId) {
        if !self.ues.has_row_id(row) {
            tracing::warn!(%row, "Removal of unknown UE");
            debug_assert!(false, "{row} removed twice");
            return;
        }
        self.deactivate(row);
        let Some((ctx, _, _, channels, groups)) = self.ues.take(row) else {
            return;
        };
        for (_, ch) in channels.iter() {
            if let Some(qos) = ch.qos {
                self.dl_qos.detach(qos);
            }
        }
        for (_, group) in groups.iter() {
            if let Some(qos) = group.qos {
                self.ul_qos.detach(qos);
            }
        }
        self.directory.unregister(ctx.ue_index);
        tracing::debug!(ue_index = %ctx.ue_index, "UE logical channels removed");
    }

    pub(super) fn set_fallback_state(&mut self, row: RowId, enter: bool) {
        let (ctx, dl, ul, channels, groups) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;
        if dl.fallback != enter {
            for (lcid, ch) in channels.iter() {
                if let Some(slice_id) = ch.slice_id {
                    let old = dl.slice_contribution(lcid, ch, dl.fallback);
                    let new = dl.slice_contribution(lcid, ch, enter);
                    apply_slice_delta(&mut dl.slices, &mut self.directory, Direction::Dl, ue_index, slice_id, old, new);
                }
            }
            dl.fallback = enter;
        }
        if ul.fallback != enter {
            for (_, group) in groups.iter() {
                if let Some(slice_id) = group.slice_id {
                    let old = group.slice_contribution(ul.fallback);
                    let new = group.slice_contribution(enter);
                    apply_slice_delta(&mut ul.slices, &mut self.directory, Direction::Ul, ue_index, slice_id, old, new);
                }
            }
            ul.fallback = enter;
        }
        tracing::debug!(%ue_index, fallback = enter, "UE fallback state changed");
    }

    pub(super) fn set_lcid_ran_slice(&mut self, row: RowId, lcid: Lcid, slice_id: RanSliceId) {
        let (ctx, dl, _, channels, _) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;
        if !channels.contains(lcid) {
            tracing::warn!(%ue_index, %lcid, %slice_id, "RAN slice set for unconfigured logical channel");
            return;
        }
        let current = channels.get(lcid).and_then(|ch| ch.slice_id);
        let frees_entry = current.is_some_and(|current| {
            !channels
                .iter()
                .any(|(other, ch)| other != lcid && ch.slice_id == Some(current))
        });
        if !has_room_for(&dl.slices, slice_id, frees_entry) {
            tracing::warn!(%ue_index, %lcid, %slice_id, "Too many RAN slices for UE");
            return;
        }
        detach_dl_slice(dl, channels, &mut self.directory, ue_index, lcid);
        let inserted = dl.slices.insert(slice_id);
        debug_assert!(inserted, "{slice_id} did not fit after the capacity check");
        self.directory.ensure_slice(slice_id);
        if let Some(ch) = channels.get_mut(lcid) {
            ch.slice_id = Some(slice_id);
            let new = dl.slice_contribution(lcid, ch, dl.fallback);
            apply_slice_delta(&mut dl.slices, &mut self.directory, Direction::Dl, ue_index, slice_id, 0, new);
        }
    }

    pub(super) fn set_lcg_ran_slice(&mut self, row: RowId, lcg: LcgId, slice_id: RanSliceId) {
        let (ctx, _, ul, _, groups) = self.ues.at_mut(row);
        let ue_index = ctx.ue_index;
        if !groups.contains(lcg) {
            tracing::warn!(%ue_index, %lcg, %slice_id, "RAN slice set for unconfigured logical channel group");
            return;
        }
        let current = groups.get(lcg).and_then(|group| group.slice_id);
        let frees_entry = current.is_some_and(|current| {
            !groups
                .iter()
                .any(|(other, group)| other != lcg && group.slice_id == Some(current))
        });
        if !has_room_for(&ul.slices, slice_id, frees_entry) {
            tracing::warn!(%ue_index, %lcg, %slice_id, "Too many RAN slices for UE");
            return;
        }
        detach_ul_slice(ul, groups, &mut self.directory, ue_index, lcg);
        let inserted = ul.slices.insert(slice_id);
        debug_assert!(inserted, "{slice_id} did not fit after the capacity check");
        self.directory.ensure_slice(slice_id);
        if let Some(group) = groups.get_mut(lcg) {
            group.slice_id = Some(slice_id);
            let new = group.slice_contribution(ul.fallback);
            apply_slice_delta(&mut ul.slices, &mut self.directory, Direction::Ul, ue_index, slice_id, 0, new);
        }
    }

    pub(super) fn deregister_lc_ran_slice(&mut self, row: RowId, lcid: Lcid) {
        let (ctx, dl, _, channels, _) = self.ues.at_mut(row);
        detach_dl_slice(dl, channels, &mut self.directory, ctx.ue_index, lcid);
    }

    pub(super) fn deregister_lcg_ran_slice(&mut self, row: RowId, lcg: LcgId) {
        let (ctx, _, ul, _, groups) = self.ues.at_mut(row);
        detach_ul_slice(ul, groups, &mut self.directory, ctx.ue_index, lcg);
    }
}

/// Whether `slice_id` can be bound without evicting anything. `frees_entry`
/// is set when the move releases the only reference to the current slice.
fn has_room_for(slices: &SlicePendingMap, slice_id: RanSliceId, frees_entry: bool) -> bool {
    slices.contains(slice_id) || !slices.is_full() || frees_entry
}

/// Unbinds a channel from its slice, dropping the UE's entry for that slice
/// once no other channel references it.
fn detach_dl_slice(
    dl: &mut UeDlContext,
    channels: &mut DlChannelMap,
    directory: &mut UeDirectory,
    ue_index: UeIndex,
    lcid: Lcid,
) {
    let Some(ch) = channels.get_mut(lcid) else {
        return;
    };
    let Some(slice_id) = ch.slice_id else {
        return;
    };
    let old = dl.slice_contribution(lcid, ch, dl.fallback);
    ch.slice_id = None;
    apply_slice_delta(&mut dl.slices, directory, Direction::Dl, ue_index, slice_id, old, 0);
    if !channels.iter().any(|(_, ch)| ch.slice_id == Some(slice_id)) {
        dl.slices.remove(slice_id);
    }
}

fn detach_ul_slice(
    ul: &mut UeUlContext,
    groups: &mut UlGroupMap,
    directory: &mut UeDirectory,
    ue_index: UeIndex,
    lcg: LcgId,
) {
    let Some(group) = groups.get_mut(lcg) else {
        return;
    };
    let Some(slice_id) = group.slice_id else {
        return;
    };
    let old = group.slice_contribution(ul.fallback);
    group.slice_id = None;
    apply_slice_delta(&mut ul.slices, directory, Direction::Ul, ue_index, slice_id, old, 0);
    if !groups.iter().any(|(_, g)| g.slice_id == Some(slice_id)) {
        ul.slices.remove(slice_id);
    }
}

fn window_slots(average_window_ms: u32, slots_per_ms: u32) -> usize {
    average_window_ms.min(MAX_GBR_AVERAGING_WINDOW_MS) as usize * slots_per_ms as usize
}

fn validate_channel_configs(configs: &[LogicalChannelConfig]) -> Result<(), LogicalChannelError> {
    let mut seen = [false; MAX_NOF_RB_LCIDS];
    for cfg in configs {
        if std::mem::replace(&mut seen[cfg.lcid.index()], true) {
            return Err(LogicalChannelError::DuplicateLcid(cfg.lcid));
        }
        let Some(gbr) = cfg.gbr() else {
            continue;
        };
        if gbr.average_window_ms == 0 {
            return Err(LogicalChannelError::InvalidAveragingWindow(cfg.lcid));
        }
        if gbr.average_window_ms > MAX_GBR_AVERAGING_WINDOW_MS {
            return Err(LogicalChannelError::AveragingWindowTooLong {
                lcid: cfg.lcid,
                window_ms: gbr.average_window_ms,
                max_ms: MAX_GBR_AVERAGING_WINDOW_MS,
            });
        }
    }
    Ok(())
}

/// Scheduling order: SRB0, SRB1, the remaining SRBs by LCID, then DRBs by
/// `priority * arp_priority`. Equal ranks keep configuration order.
pub(super) fn sorted_channel_list(configs: &[LogicalChannelConfig]) -> ArrayVec<Lcid, MAX_NOF_RB_LCIDS> {
    let mut sorted: ArrayVec<&LogicalChannelConfig, MAX_NOF_RB_LCIDS> = configs.iter().collect();
    sorted.sort_by_key(|cfg| channel_rank(cfg));
    sorted.iter().map(|cfg| cfg.lcid).collect()
}

fn channel_rank(cfg: &LogicalChannelConfig) -> (u8, u32) {
    match cfg.lcid {
        Lcid::SRB0 => (0, 0),
        Lcid::SRB1 => (1, 0),
        lcid if lcid.is_srb() => (2, u32::from(lcid.value())),
        _ => (3, u32::from(cfg.priority) * u32::from(cfg.arp_priority())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcid(value: u8) -> Lcid {
        Lcid::new(value).unwrap()
    }

    fn lcg(value: u8) -> LcgId {
        LcgId::new(value).unwrap()
    }

    #[test]
    fn test_channel_sorting() {
        let configs = [
            LogicalChannelConfig::new(lcid(5), 4, lcg(1)).with_qos(2),
            LogicalChannelConfig::new(lcid(4), 9, lcg(1)).with_qos(1),
            LogicalChannelConfig::new(Lcid::SRB2, 3, lcg(0)),
            LogicalChannelConfig::new(Lcid::SRB1, 1, lcg(0)),
            LogicalChannelConfig::new(lcid(6), 8, lcg(2)).with_qos(1),
            LogicalChannelConfig::new(Lcid::SRB0, 1, lcg(0)),
        ];
        let sorted = sorted_channel_list(&configs);
        // LCID5 and LCID6 tie at 8 and keep configuration order.
        assert_eq!(
            sorted.as_slice(),
            &[Lcid::SRB0, Lcid::SRB1, Lcid::SRB2, lcid(5), lcid(6), lcid(4)]
        );
    }

    #[test]
    fn test_channels_without_qos_rank_last() {
        let configs = [
            LogicalChannelConfig::new(lcid(4), 2, lcg(1)),
            LogicalChannelConfig::new(lcid(5), 10, lcg(1)).with_qos(1),
        ];
        // 2 * 15 > 10 * 1
        assert_eq!(sorted_channel_list(&configs).as_slice(), &[lcid(5), lcid(4)]);
    }

    #[test]
    fn test_validation() {
        let duplicated = [
            LogicalChannelConfig::new(Lcid::SRB1, 1, lcg(0)),
            LogicalChannelConfig::new(Lcid::SRB1, 2, lcg(0)),
        ];
        assert!(matches!(
            validate_channel_configs(&duplicated),
            Err(LogicalChannelError::DuplicateLcid(Lcid::SRB1))
        ));

        let zero_window = [LogicalChannelConfig::new(lcid(4), 1, lcg(1)).with_gbr(0, 1, 1)];
        assert!(matches!(
            validate_channel_configs(&zero_window),
            Err(LogicalChannelError::InvalidAveragingWindow(_))
        ));

        let too_long = [LogicalChannelConfig::new(lcid(4), 1, lcg(1)).with_gbr(4096, 1, 1)];
        assert!(matches!(
            validate_channel_configs(&too_long),
            Err(LogicalChannelError::AveragingWindowTooLong { window_ms: 4096, max_ms: 4095, .. })
        ));
        let longest = [LogicalChannelConfig::new(lcid(4), 1, lcg(1)).with_gbr(4095, 1, 1)];
        assert!(validate_channel_configs(&longest).is_ok());
        assert_eq!(window_slots(4095, 16), 4095 * 16);
    }
}
