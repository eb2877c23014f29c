use serde::{Deserialize, Serialize};

use super::lcid::LcidDlSch;
use super::sdu::mac_sdu_subheader_size;

/// Fixed-size CEs carry a one-byte R/LCID subheader.
pub const FIXED_SIZED_MAC_CE_SUBHEADER_SIZE: u32 = 1;
/// UE Contention Resolution Identity payload length.
pub const UE_CON_RES_ID_LEN: u32 = 6;
pub const UE_CON_RES_ID_CE_REQUIRED_BYTES: u32 =
    UE_CON_RES_ID_LEN + FIXED_SIZED_MAC_CE_SUBHEADER_SIZE;

/// Timing Advance Command CE content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaCmdCePayload {
    pub tag_id: u8,
    pub ta_cmd: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MacCePayload {
    TaCmd(TaCmdCePayload),
    /// Content is produced when the PDU is assembled. `len` only matters for
    /// variable-length CEs.
    Opaque { len: u16 },
}

/// A MAC CE waiting to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacCeInfo {
    pub lcid: LcidDlSch,
    pub payload: MacCePayload,
}

impl MacCeInfo {
    pub fn ta_cmd(tag_id: u8, ta_cmd: u8) -> Self {
        MacCeInfo {
            lcid: LcidDlSch::TA_CMD,
            payload: MacCePayload::TaCmd(TaCmdCePayload { tag_id, ta_cmd }),
        }
    }

    pub fn con_res_id() -> Self {
        MacCeInfo {
            lcid: LcidDlSch::UE_CON_RES_ID,
            payload: MacCePayload::Opaque { len: 0 },
        }
    }

    pub fn opaque(lcid: LcidDlSch, len: u16) -> Self {
        MacCeInfo {
            lcid,
            payload: MacCePayload::Opaque { len },
        }
    }

    /// CE payload size, excluding the subheader.
    pub fn payload_size(&self) -> u32 {
        match self.lcid.sizeof_ce() {
            Some(size) => size,
            None => match self.payload {
                MacCePayload::Opaque { len } => u32::from(len),
                MacCePayload::TaCmd(_) => 1,
            },
        }
    }
}

/// CE payload plus subheader.
pub fn mac_ce_required_bytes(ce: &MacCeInfo) -> u32 {
    let payload = ce.payload_size();
    if ce.lcid.is_var_len_ce() {
        payload + mac_sdu_subheader_size(payload.max(1))
    } else {
        payload + FIXED_SIZED_MAC_CE_SUBHEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_size_ce() {
        assert_eq!(mac_ce_required_bytes(&MacCeInfo::ta_cmd(0, 31)), 2);
        assert_eq!(
            mac_ce_required_bytes(&MacCeInfo::con_res_id()),
            UE_CON_RES_ID_CE_REQUIRED_BYTES
        );
        // The declared length is ignored for fixed-size CEs.
        let scell = MacCeInfo::opaque(LcidDlSch::SCELL_ACTIV_4_OCTET, 100);
        assert_eq!(mac_ce_required_bytes(&scell), 5);
    }

    #[test]
    fn test_variable_size_ce() {
        let small = MacCeInfo::opaque(LcidDlSch::SP_SRS_ACTIV, 10);
        assert_eq!(mac_ce_required_bytes(&small), 12);
        let large = MacCeInfo::opaque(LcidDlSch::TCI_STATES_ACTIV_DEACTIV_UE_PDSCH, 300);
        assert_eq!(mac_ce_required_bytes(&large), 303);
    }
}
