//! Slot-driven replay of a [`Scenario`] against a [`LogicalChannelSystem`].
//!
//! Every slot the runner delivers the events scheduled for it, then offers
//! each UE with pending data its DL transport block budget and its UL grant,
//! and finally ticks [`LogicalChannelSystem::slot_indication`]. Events with
//! the same slot are applied in file order, so runs are deterministic.

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use crate::config::ConfigError;
use crate::logical_channel::{LogicalChannelError, LogicalChannelSystem, UeLogicalChannelRepository};
use crate::mac::{DlMsgTbInfo, LcgId, MacCeInfo, RanSliceId, SlotPoint, UeIndex, UlBsrIndication};

mod scenario;

pub use scenario::*;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("failed to read scenario {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to set up {ue_index}")]
    Ue {
        ue_index: UeIndex,
        #[source]
        source: LogicalChannelError,
    },
    #[error("event at slot {slot} targets unknown {ue_index}")]
    UnknownUe { slot: u64, ue_index: UeIndex },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationReport {
    pub slots: u64,
    /// Events scheduled after the last simulated slot.
    pub skipped_events: usize,
    pub ues: Vec<UeReport>,
    pub slices: Vec<SliceReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UeReport {
    pub ue_index: u16,
    pub dl_bytes: u64,
    pub dl_subpdus: u64,
    pub dl_ces: u64,
    pub ul_bytes: u64,
    pub remaining_dl_bytes: u32,
    pub remaining_ul_bytes: u32,
    pub gbr_channels: Vec<GbrChannelReport>,
}

/// Throughput of a GBR channel averaged over its window, at the end of the
/// run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GbrChannelReport {
    pub lcid: u8,
    pub dl_bps: f64,
    pub guaranteed_dl_bps: u64,
    pub satisfied: bool,
}

/// UEs still pending in a slice at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliceReport {
    pub slice_id: u8,
    pub pending_dl_ues: usize,
    pub pending_ul_ues: usize,
}

struct SimulatedUe<'a> {
    scenario: &'a UeScenario,
    repository: UeLogicalChannelRepository,
    report: UeReport,
}

/// Runs `slots` slots, or the scenario's own count if `None`.
pub fn run(scenario: &Scenario, slots: Option<u64>) -> Result<SimulationReport, SimulationError> {
    let nof_slots = slots.or(scenario.slots).unwrap_or(DEFAULT_SIMULATION_SLOTS);
    let system = LogicalChannelSystem::new(&scenario.system)?;
    tracing::info!(slots = nof_slots, ues = scenario.ues.len(), "Starting simulation");

    let mut ues = Vec::with_capacity(scenario.ues.len());
    for ue in &scenario.ues {
        ues.push(setup_ue(&system, ue)?);
    }

    let mut events: Vec<&ScenarioEvent> = scenario.events.iter().collect();
    events.sort_by_key(|event| event.slot);
    let mut events = events.into_iter().peekable();

    for slot in 0..nof_slots {
        while let Some(event) = events.next_if(|event| event.slot <= slot) {
            let ue = ues
                .iter_mut()
                .find(|ue| ue.scenario.ue_index == event.ue_index)
                .ok_or(SimulationError::UnknownUe {
                    slot: event.slot,
                    ue_index: event.ue_index,
                })?;
            apply_event(&mut ue.repository, &event.action, SlotPoint(slot));
        }

        for ue in &mut ues {
            schedule_ue(ue);
        }
        system.slot_indication();
    }
    let skipped_events = events.count();
    if skipped_events > 0 {
        tracing::warn!(skipped_events, "Events scheduled after the last slot were not delivered");
    }

    let slices = scenario
        .slices()
        .into_iter()
        .map(|slice_id| slice_report(&system, slice_id))
        .collect();
    let ues = ues.into_iter().map(finish_ue).collect();
    tracing::info!(slots = nof_slots, "Simulation finished");

    Ok(SimulationReport {
        slots: nof_slots,
        skipped_events,
        ues,
        slices,
    })
}

fn setup_ue<'a>(
    system: &LogicalChannelSystem,
    scenario: &'a UeScenario,
) -> Result<SimulatedUe<'a>, SimulationError> {
    let ue_index = scenario.ue_index;
    let mut repository = system
        .create_ue(
            ue_index,
            scenario.scs,
            scenario.fallback,
            Some(Arc::from(scenario.channels.as_slice())),
        )
        .map_err(|source| SimulationError::Ue { ue_index, source })?;
    for binding in &scenario.lcid_slices {
        repository.set_lcid_ran_slice(binding.lcid, binding.slice);
    }
    for binding in &scenario.lcg_slices {
        repository.set_lcg_ran_slice(binding.lcg_id, binding.slice);
    }
    Ok(SimulatedUe {
        scenario,
        repository,
        report: UeReport {
            ue_index: ue_index.0,
            ..UeReport::default()
        },
    })
}

fn apply_event(repository: &mut UeLogicalChannelRepository, action: &EventAction, now: SlotPoint) {
    tracing::debug!(ue_index = %repository.ue_index(), %now, ?action, "Delivering event");
    match action {
        EventAction::DlBufferStatus { lcid, bytes } => {
            repository.handle_dl_buffer_status_indication(*lcid, *bytes, Some(now))
        }
        EventAction::TaCmd { tag_id, ta_cmd } => {
            repository.handle_mac_ce_indication(MacCeInfo::ta_cmd(*tag_id, *ta_cmd))
        }
        EventAction::ConResId => repository.handle_mac_ce_indication(MacCeInfo::con_res_id()),
        EventAction::MacCe { lcid, len } => {
            repository.handle_mac_ce_indication(MacCeInfo::opaque(*lcid, *len))
        }
        EventAction::Bsr { format, reports } => {
            let mut bsr = UlBsrIndication::new(*format);
            for report in reports {
                bsr.push(report.lcg_id, report.nof_bytes);
            }
            repository.handle_bsr_indication(&bsr);
        }
        EventAction::Sr => repository.handle_sr_indication(),
        EventAction::Fallback { enabled } => repository.set_fallback_state(*enabled),
        EventAction::Deactivate => repository.deactivate(),
        EventAction::Reconfigure { channels } => {
            if let Err(error) = repository.configure(Arc::from(channels.as_slice())) {
                tracing::warn!(ue_index = %repository.ue_index(), %error, "Reconfiguration rejected");
            }
        }
    }
}

fn schedule_ue(ue: &mut SimulatedUe<'_>) {
    let budget = ue.scenario.dl_budget_per_slot;
    if budget > 0 && ue.repository.has_dl_pending_bytes() {
        let mut tb = DlMsgTbInfo::new();
        let allocated = ue.repository.build_dl_transport_block_info(&mut tb, budget);
        ue.report.dl_bytes += u64::from(allocated);
        ue.report.dl_subpdus += tb.len() as u64;
        ue.report.dl_ces += tb.iter().filter(|subpdu| subpdu.lcid.is_ce()).count() as u64;
    }

    let grant = ue.scenario.ul_grant_per_slot;
    if grant > 0 && ue.repository.has_ul_pending_bytes() {
        let granted = ue.repository.handle_ul_grant(grant);
        ue.report.ul_bytes += u64::from(granted);
    }
}

fn finish_ue(ue: SimulatedUe<'_>) -> UeReport {
    let SimulatedUe {
        scenario,
        repository,
        mut report,
    } = ue;
    report.remaining_dl_bytes = repository.total_dl_pending_bytes();
    report.remaining_ul_bytes = LcgId::iter()
        .map(|lcg| repository.pending_bytes_lcg(lcg))
        .sum();
    report.gbr_channels = scenario
        .channels
        .iter()
        .filter_map(|cfg| {
            let gbr = cfg.gbr()?;
            let rate = repository.average_dl_bit_rate(cfg.lcid)?;
            Some(GbrChannelReport {
                lcid: cfg.lcid.value(),
                dl_bps: rate.bits_per_second(),
                guaranteed_dl_bps: gbr.gbr_dl_bps,
                satisfied: rate.satisfies(gbr.gbr_dl_bps),
            })
        })
        .collect();
    report
}

fn slice_report(system: &LogicalChannelSystem, slice_id: RanSliceId) -> SliceReport {
    let pending_dl_ues = system.dl_pending_ues(slice_id).map_or(0, |ues| ues.count_ones());
    let pending_ul_ues = system.ul_pending_ues(slice_id).map_or(0, |ues| ues.count_ones());
    SliceReport {
        slice_id: slice_id.0,
        pending_dl_ues,
        pending_ul_ues,
    }
}
