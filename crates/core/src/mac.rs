//! MAC layer identifiers, framing rules and the messages exchanged with the
//! layers around the logical channel system.

mod bsr;
mod ce;
mod lcid;
mod sdu;
mod slot;
mod subpdu;

pub use bsr::{BsrFormat, UlBsrIndication, UlBsrLcgReport, MAX_BSR_BYTES, MAX_SHORT_BSR_RELIABLE_BYTES};
pub use ce::{
    mac_ce_required_bytes, MacCeInfo, MacCePayload, TaCmdCePayload,
    FIXED_SIZED_MAC_CE_SUBHEADER_SIZE, UE_CON_RES_ID_CE_REQUIRED_BYTES, UE_CON_RES_ID_LEN,
};
pub use lcid::{
    IdentifierError, LcgId, Lcid, LcidDlSch, RanSliceId, UeIndex, MAX_NOF_LCGS, MAX_NOF_RB_LCIDS,
};
pub use sdu::{
    mac_sdu_payload_size, mac_sdu_required_bytes, mac_sdu_subheader_size,
    MAC_SDU_SUBHEADER_LENGTH_THRES, MAX_MAC_SDU_SUBHEADER_SIZE, MIN_MAC_SDU_SUBHEADER_SIZE,
};
pub use slot::{SlotPoint, SubcarrierSpacing};
pub use subpdu::{DlMsgLcInfo, DlMsgTbInfo, MAX_SUBPDUS_PER_TB};
