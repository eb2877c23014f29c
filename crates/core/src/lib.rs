//! Logical channel resource accounting for a cellular MAC scheduler.
//!
//! For every UE the crate tracks how many bytes are queued per logical
//! channel (DL) and per logical channel group (UL), which RAN slice owns them
//! and which MAC CEs are waiting, and carves the byte budget the radio
//! scheduler grants a UE into MAC subPDUs.

/// System configuration, allocation policy and logger setup.
pub mod config;

/// The per-cell logical channel system and the per-UE repository.
pub mod logical_channel;

/// MAC identifiers, subheader rules, CEs, BSRs and subPDU descriptors.
pub mod mac;

/// Sliding-window throughput averaging for GBR bearers.
pub mod qos;

/// Scenario replay used by the `lcsim` binary and the integration tests.
pub mod simulation;

/// Columnar storage with stable row handles.
pub mod soa;

pub use logical_channel::{
    LogicalChannelError, LogicalChannelSystem, UeLogicalChannelRepository,
};
