use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::mac::{LcgId, Lcid};

/// ARP priority level assumed for channels configured without QoS
/// information (lowest priority).
pub const DEFAULT_ARP_PRIORITY: u8 = 15;

/// Longest GBR averaging window RRC can signal.
pub const MAX_GBR_AVERAGING_WINDOW_MS: u32 = 4095;

/// Immutable snapshot of a UE's logical channel configuration, shared with
/// the RRC layer and replaced wholesale on reconfiguration.
pub type LogicalChannelConfigList = Arc<[LogicalChannelConfig]>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalChannelConfig {
    pub lcid: Lcid,
    /// Logical channel priority, 1 being the highest.
    pub priority: u8,
    pub lcg_id: LcgId,
    #[serde(default)]
    pub qos: Option<QosConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosConfig {
    /// Allocation and retention priority level, 1 being the highest.
    pub arp_priority: u8,
    #[serde(default)]
    pub gbr: Option<GbrQosConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GbrQosConfig {
    /// Window over which the bit rate is averaged.
    pub average_window_ms: u32,
    #[serde(default)]
    pub gbr_dl_bps: u64,
    #[serde(default)]
    pub gbr_ul_bps: u64,
}

impl LogicalChannelConfig {
    pub fn new(lcid: Lcid, priority: u8, lcg_id: LcgId) -> Self {
        LogicalChannelConfig {
            lcid,
            priority,
            lcg_id,
            qos: None,
        }
    }

    pub fn with_qos(mut self, arp_priority: u8) -> Self {
        self.qos = Some(QosConfig {
            arp_priority,
            gbr: None,
        });
        self
    }

    /// Enables GBR tracking. Sets the ARP priority to the highest level if no
    /// QoS information was given before.
    pub fn with_gbr(mut self, average_window_ms: u32, gbr_dl_bps: u64, gbr_ul_bps: u64) -> Self {
        let qos = self.qos.get_or_insert(QosConfig {
            arp_priority: 1,
            gbr: None,
        });
        qos.gbr = Some(GbrQosConfig {
            average_window_ms,
            gbr_dl_bps,
            gbr_ul_bps,
        });
        self
    }

    pub fn arp_priority(&self) -> u8 {
        self.qos
            .as_ref()
            .map_or(DEFAULT_ARP_PRIORITY, |qos| qos.arp_priority)
    }

    pub fn gbr(&self) -> Option<&GbrQosConfig> {
        self.qos.as_ref().and_then(|qos| qos.gbr.as_ref())
    }

    pub fn is_gbr(&self) -> bool {
        self.gbr().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_channel_list() {
        #[derive(Deserialize)]
        struct Channels {
            channels: Vec<LogicalChannelConfig>,
        }

        let parsed: Channels = toml::from_str(
            r#"
            [[channels]]
            lcid = 1
            priority = 1
            lcg_id = 0

            [[channels]]
            lcid = 4
            priority = 9
            lcg_id = 1
            qos = { arp_priority = 2, gbr = { average_window_ms = 100 } }
            "#,
        )
        .unwrap();

        assert_eq!(parsed.channels.len(), 2);
        assert_eq!(parsed.channels[0].arp_priority(), DEFAULT_ARP_PRIORITY);
        assert!(!parsed.channels[0].is_gbr());
        assert_eq!(parsed.channels[1].arp_priority(), 2);
        assert_eq!(parsed.channels[1].gbr().unwrap().average_window_ms, 100);
    }

    #[test]
    fn test_out_of_range_lcid_is_rejected() {
        let res: Result<LogicalChannelConfig, _> =
            toml::from_str("lcid = 40\npriority = 1\nlcg_id = 0");
        assert!(res.is_err());
    }
}
