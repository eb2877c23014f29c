//! MAC SDU subheader sizing (TS 38.321, 6.1.2).

/// Subheader with an 8-bit L field.
pub const MIN_MAC_SDU_SUBHEADER_SIZE: u32 = 2;
/// Subheader with a 16-bit L field.
pub const MAX_MAC_SDU_SUBHEADER_SIZE: u32 = 3;
/// Payloads of this size and above need the 16-bit L field.
pub const MAC_SDU_SUBHEADER_LENGTH_THRES: u32 = 256;

pub const fn mac_sdu_subheader_size(payload: u32) -> u32 {
    if payload == 0 {
        0
    } else if payload < MAC_SDU_SUBHEADER_LENGTH_THRES {
        MIN_MAC_SDU_SUBHEADER_SIZE
    } else {
        MAX_MAC_SDU_SUBHEADER_SIZE
    }
}

/// Payload plus subheader.
pub const fn mac_sdu_required_bytes(payload: u32) -> u32 {
    payload + mac_sdu_subheader_size(payload)
}

/// Largest payload that fits in `sdu_and_subheader` bytes.
pub const fn mac_sdu_payload_size(sdu_and_subheader: u32) -> u32 {
    if sdu_and_subheader <= MIN_MAC_SDU_SUBHEADER_SIZE {
        0
    } else if sdu_and_subheader - MIN_MAC_SDU_SUBHEADER_SIZE < MAC_SDU_SUBHEADER_LENGTH_THRES {
        sdu_and_subheader - MIN_MAC_SDU_SUBHEADER_SIZE
    } else {
        sdu_and_subheader - MAX_MAC_SDU_SUBHEADER_SIZE
    }
}
