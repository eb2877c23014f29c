use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::config::{LogicalChannelConfig, SystemConfig};
use crate::mac::{
    BsrFormat, LcgId, Lcid, LcidDlSch, RanSliceId, SubcarrierSpacing, UeIndex, UlBsrLcgReport,
};

use super::SimulationError;

/// Number of slots simulated when neither the scenario nor the caller says.
pub const DEFAULT_SIMULATION_SLOTS: u64 = 100;

/// A cell, its UEs and the indications they receive over time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub slots: Option<u64>,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub ues: Vec<UeScenario>,
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeScenario {
    pub ue_index: UeIndex,
    #[serde(default)]
    pub scs: SubcarrierSpacing,
    #[serde(default)]
    pub fallback: bool,
    /// DL transport block size offered to the UE every slot.
    #[serde(default)]
    pub dl_budget_per_slot: u32,
    /// UL grant offered to the UE every slot.
    #[serde(default)]
    pub ul_grant_per_slot: u32,
    pub channels: Vec<LogicalChannelConfig>,
    #[serde(default)]
    pub lcid_slices: Vec<LcidSliceBinding>,
    #[serde(default)]
    pub lcg_slices: Vec<LcgSliceBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcidSliceBinding {
    pub lcid: Lcid,
    pub slice: RanSliceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcgSliceBinding {
    pub lcg_id: LcgId,
    pub slice: RanSliceId,
}

/// An indication delivered to one UE at the start of `slot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    pub slot: u64,
    pub ue_index: UeIndex,
    pub action: EventAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventAction {
    DlBufferStatus {
        lcid: Lcid,
        bytes: u32,
    },
    TaCmd {
        #[serde(default)]
        tag_id: u8,
        ta_cmd: u8,
    },
    ConResId,
    /// Any other MAC CE; `len` is only used by variable-length CEs.
    MacCe {
        lcid: LcidDlSch,
        #[serde(default)]
        len: u16,
    },
    Bsr {
        format: BsrFormat,
        reports: Vec<UlBsrLcgReport>,
    },
    Sr,
    Fallback {
        enabled: bool,
    },
    Deactivate,
    Reconfigure {
        channels: Vec<LogicalChannelConfig>,
    },
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self, SimulationError> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.system.validate()?;
        Ok(scenario)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SimulationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Every slice some UE binds a channel or group to, in ascending order.
    pub fn slices(&self) -> Vec<RanSliceId> {
        let mut slices: Vec<RanSliceId> = self
            .ues
            .iter()
            .flat_map(|ue| {
                ue.lcid_slices
                    .iter()
                    .map(|b| b.slice)
                    .chain(ue.lcg_slices.iter().map(|b| b.slice))
            })
            .collect();
        slices.sort_unstable();
        slices.dedup();
        slices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_toml_str(
            r#"
            slots = 10

            [system]
            max_ues = 4

            [[ues]]
            ue_index = 1
            scs = "khz30"
            dl_budget_per_slot = 200
            channels = [
                { lcid = 1, priority = 1, lcg_id = 0 },
                { lcid = 4, priority = 9, lcg_id = 1 },
            ]
            lcid_slices = [{ lcid = 4, slice = 2 }]

            [[events]]
            slot = 3
            ue_index = 1
            action = { type = "dl_buffer_status", lcid = 4, bytes = 1000 }

            [[events]]
            slot = 4
            ue_index = 1
            action = { type = "bsr", format = "long_bsr", reports = [{ lcg_id = 1, nof_bytes = 50 }] }

            [[events]]
            slot = 5
            ue_index = 1
            action = { type = "con_res_id" }
            "#,
        )
        .unwrap();

        assert_eq!(scenario.slots, Some(10));
        assert_eq!(scenario.system.max_ues, 4);
        assert_eq!(scenario.ues[0].scs, SubcarrierSpacing::Khz30);
        assert_eq!(scenario.ues[0].ul_grant_per_slot, 0);
        assert_eq!(scenario.slices(), vec![RanSliceId(2)]);
        assert_eq!(
            scenario.events[0].action,
            EventAction::DlBufferStatus {
                lcid: Lcid::new(4).unwrap(),
                bytes: 1000
            }
        );
        assert!(matches!(
            scenario.events[1].action,
            EventAction::Bsr {
                format: BsrFormat::LongBsr,
                ..
            }
        ));
        assert_eq!(scenario.events[2].action, EventAction::ConResId);
    }

    #[test]
    fn test_invalid_system_config_is_rejected() {
        let res = Scenario::from_toml_str("[system]\nmax_ues = 0");
        assert!(matches!(res, Err(SimulationError::Config(_))));
    }
}
