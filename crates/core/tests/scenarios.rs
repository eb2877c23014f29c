//! End-to-end behaviour of a single UE driven through the public API.

use std::sync::Arc;

use mac_bearer::config::{LogicalChannelConfig, LogicalChannelConfigList, SystemConfig};
use mac_bearer::mac::{
    mac_sdu_required_bytes, DlMsgLcInfo, LcgId, Lcid, LcidDlSch, MacCeInfo, MacCePayload,
    RanSliceId, SubcarrierSpacing, TaCmdCePayload, UeIndex,
};
use mac_bearer::{LogicalChannelSystem, UeLogicalChannelRepository};
use testresult::TestResult;

fn drb4() -> Lcid {
    Lcid::new(4).unwrap()
}

fn channels() -> LogicalChannelConfigList {
    Arc::from(vec![
        LogicalChannelConfig::new(Lcid::SRB0, 1, LcgId::new(0).unwrap()),
        LogicalChannelConfig::new(Lcid::SRB1, 1, LcgId::new(0).unwrap()),
        LogicalChannelConfig::new(drb4(), 9, LcgId::new(1).unwrap()).with_qos(3),
    ])
}

fn setup() -> Result<(LogicalChannelSystem, UeLogicalChannelRepository), Box<dyn std::error::Error>> {
    let system = LogicalChannelSystem::new(&SystemConfig::default())?;
    let ue = system.create_ue(UeIndex(0), SubcarrierSpacing::Khz30, false, Some(channels()))?;
    Ok((system, ue))
}

#[test]
fn new_ue_has_nothing_pending() -> TestResult {
    let (_system, ue) = setup()?;
    assert_eq!(ue.total_dl_pending_bytes(), 0);
    assert!(!ue.has_dl_pending_bytes());
    assert!(!ue.has_ul_pending_bytes());
    assert_eq!(
        ue.sorted_channels().as_slice(),
        &[Lcid::SRB0, Lcid::SRB1, drb4()]
    );
    Ok(())
}

#[test]
fn buffer_status_includes_subheader() -> TestResult {
    let (_system, mut ue) = setup()?;
    ue.handle_dl_buffer_status_indication(Lcid::SRB1, 50, None);
    assert_eq!(ue.pending_bytes(Lcid::SRB1), mac_sdu_required_bytes(50));
    assert_eq!(ue.pending_bytes(Lcid::SRB1), 52);
    assert!(ue.has_dl_pending_bytes());
    Ok(())
}

#[test]
fn repeated_ta_command_keeps_latest() -> TestResult {
    let (system, mut ue) = setup()?;
    ue.handle_mac_ce_indication(MacCeInfo::ta_cmd(0, 12));
    ue.handle_mac_ce_indication(MacCeInfo::ta_cmd(0, 40));
    assert_eq!(system.nof_queued_ces(), 1);

    let mut subpdu = DlMsgLcInfo::default();
    assert!(ue.allocate_mac_ce(&mut subpdu, 64) > 0);
    assert_eq!(subpdu.lcid, LcidDlSch::TA_CMD);
    assert_eq!(
        subpdu.ce_payload,
        Some(MacCePayload::TaCmd(TaCmdCePayload {
            tag_id: 0,
            ta_cmd: 40
        }))
    );
    assert_eq!(ue.allocate_mac_ce(&mut subpdu, 64), 0);
    Ok(())
}

#[test]
fn slices_are_accounted_independently() -> TestResult {
    let (system, mut ue) = setup()?;
    ue.set_lcid_ran_slice(Lcid::SRB1, RanSliceId(0));
    ue.set_lcid_ran_slice(drb4(), RanSliceId(1));
    ue.handle_dl_buffer_status_indication(Lcid::SRB1, 1_000, None);
    ue.handle_dl_buffer_status_indication(drb4(), 2_000, None);

    assert_eq!(ue.dl_pending_bytes(RanSliceId(0)), mac_sdu_required_bytes(1_000));
    assert_eq!(ue.dl_pending_bytes(RanSliceId(1)), mac_sdu_required_bytes(2_000));
    for slice_id in [RanSliceId(0), RanSliceId(1)] {
        let ues = system.dl_pending_ues(slice_id).unwrap();
        assert!(ues[0]);
    }

    ue.handle_dl_buffer_status_indication(Lcid::SRB1, 0, None);
    assert_eq!(ue.dl_pending_bytes(RanSliceId(0)), 0);
    assert_eq!(ue.dl_pending_bytes(RanSliceId(1)), mac_sdu_required_bytes(2_000));
    assert!(!system.dl_pending_ues(RanSliceId(0)).unwrap()[0]);
    Ok(())
}

#[test]
fn fallback_only_counts_srbs() -> TestResult {
    let (_system, mut ue) = setup()?;
    ue.handle_dl_buffer_status_indication(Lcid::SRB0, 40, None);
    ue.handle_dl_buffer_status_indication(Lcid::SRB1, 60, None);
    ue.handle_dl_buffer_status_indication(drb4(), 5_000, None);

    ue.set_fallback_state(true);
    assert_eq!(
        ue.total_dl_pending_bytes(),
        ue.pending_bytes(Lcid::SRB0) + ue.pending_bytes(Lcid::SRB1)
    );
    assert_eq!(ue.total_dl_pending_bytes(), 42 + 62);
    assert!(!ue.has_pending_bytes(drb4()));

    ue.set_fallback_state(false);
    assert_eq!(ue.pending_bytes(drb4()), mac_sdu_required_bytes(5_000));
    Ok(())
}

#[test]
fn repeated_allocation_drains_channel_within_budget() -> TestResult {
    let (_system, mut ue) = setup()?;
    ue.handle_dl_buffer_status_indication(Lcid::SRB1, 1_000, None);
    let budget = 100;
    assert!(budget < ue.pending_bytes(Lcid::SRB1) + 1);

    let mut allocated = 0;
    let mut consumed = 0;
    let mut subpdu = DlMsgLcInfo::default();
    for _ in 0..100 {
        if !ue.has_pending_bytes(Lcid::SRB1) {
            break;
        }
        let alloc = ue.allocate_mac_sdu(&mut subpdu, budget, Some(Lcid::SRB1));
        assert!(alloc > 0);
        assert!(alloc <= budget);
        assert_eq!(subpdu.lcid, LcidDlSch::from(Lcid::SRB1));
        allocated += alloc;
        consumed += mac_sdu_required_bytes(subpdu.sched_bytes);
    }
    assert!(!ue.has_pending_bytes(Lcid::SRB1));
    assert_eq!(allocated, consumed);
    assert!(allocated >= mac_sdu_required_bytes(1_000));
    Ok(())
}

#[test]
fn removing_ue_clears_global_state() -> TestResult {
    let (system, mut ue) = setup()?;
    ue.set_lcid_ran_slice(drb4(), RanSliceId(2));
    ue.handle_dl_buffer_status_indication(drb4(), 100, None);
    ue.handle_mac_ce_indication(MacCeInfo::con_res_id());
    assert!(system.ues_with_pending_ces()[0]);

    drop(ue);
    assert_eq!(system.nof_ues(), 0);
    assert_eq!(system.nof_queued_ces(), 0);
    assert!(system.ues_with_pending_ces().is_empty());
    assert!(system.dl_pending_ues(RanSliceId(2)).unwrap().not_any());
    Ok(())
}
