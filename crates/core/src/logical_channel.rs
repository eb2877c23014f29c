//! Logical channel resource system of one cell.
//!
//! [`LogicalChannelSystem`] owns the state of every UE: one row per UE in a
//! [`Table`](crate::soa::Table) with configuration, DL and UL state and the
//! per-LCID / per-LCG maps, a table of queued MAC CEs linked per UE through
//! row handles, QoS averaging rows for GBR bearers and the per-slice bitmaps
//! of UEs with pending data.
//!
//! The rest of the MAC talks to one UE through the
//! [`UeLogicalChannelRepository`] returned by
//! [`LogicalChannelSystem::create_ue`]. Dropping the repository removes the UE.
//!
//! Everything runs on the scheduler thread of the cell: the state is shared
//! through `Rc<RefCell<_>>` and none of the handles are `Send`.

use std::{
    cell::{Ref, RefCell},
    rc::Rc,
};

use bitvec::slice::BitSlice;

use crate::config::{ConfigError, LogicalChannelConfigList, SystemConfig};
use crate::mac::{Lcid, RanSliceId, SubcarrierSpacing, UeIndex};

mod dl;
mod repository;
mod setup;
mod slice;
mod state;
mod ul;

pub use dl::MAX_DL_BUFFER_STATUS;
pub use repository::UeLogicalChannelRepository;
pub use slice::MAX_RAN_SLICES_PER_UE;

use state::SystemState;

#[derive(Debug, thiserror::Error)]
pub enum LogicalChannelError {
    #[error("UE index {0} is already in use")]
    DuplicateUeIndex(UeIndex),
    #[error("logical channel {0} configured more than once")]
    DuplicateLcid(Lcid),
    #[error("GBR averaging window of {0} must be greater than zero")]
    InvalidAveragingWindow(Lcid),
    #[error("GBR averaging window of {lcid} is {window_ms} ms, at most {max_ms} ms allowed")]
    AveragingWindowTooLong { lcid: Lcid, window_ms: u32, max_ms: u32 },
}

/// Handle to the logical channel state of a cell. Clones share the same
/// state.
#[derive(Clone)]
pub struct LogicalChannelSystem {
    state: Rc<RefCell<SystemState>>,
}

impl LogicalChannelSystem {
    pub fn new(config: &SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(LogicalChannelSystem {
            state: Rc::new(RefCell::new(SystemState::new(config))),
        })
    }

    /// Adds a UE and applies its initial channel configuration, if any.
    pub fn create_ue(
        &self,
        ue_index: UeIndex,
        scs: SubcarrierSpacing,
        starts_in_fallback: bool,
        configs: Option<LogicalChannelConfigList>,
    ) -> Result<UeLogicalChannelRepository, LogicalChannelError> {
        let row = self
            .state
            .borrow_mut()
            .add_ue(ue_index, scs, starts_in_fallback, configs)?;
        Ok(UeLogicalChannelRepository::new(self.state.clone(), row, ue_index))
    }

    /// Folds the bytes scheduled in the ending slot into the QoS averages.
    /// Call once per slot, after the allocations of that slot.
    pub fn slot_indication(&self) {
        self.state.borrow_mut().slot_indication();
    }

    pub fn nof_ues(&self) -> usize {
        self.state.borrow().ues.len()
    }

    pub fn contains_ue(&self, ue_index: UeIndex) -> bool {
        self.state.borrow().directory.contains(ue_index)
    }

    /// UEs with pending DL data in `slice_id`, indexed by UE index. `None` if
    /// no channel was ever bound to the slice.
    ///
    /// The returned guard must be dropped before any repository is used.
    pub fn dl_pending_ues(&self, slice_id: RanSliceId) -> Option<Ref<'_, BitSlice>> {
        Ref::filter_map(self.state.borrow(), |state| {
            state
                .directory
                .slice(slice_id)
                .map(|slice| slice.pending_dl_ues.as_bitslice())
        })
        .ok()
    }

    pub fn ul_pending_ues(&self, slice_id: RanSliceId) -> Option<Ref<'_, BitSlice>> {
        Ref::filter_map(self.state.borrow(), |state| {
            state
                .directory
                .slice(slice_id)
                .map(|slice| slice.pending_ul_ues.as_bitslice())
        })
        .ok()
    }

    pub fn ues_with_pending_ces(&self) -> Ref<'_, BitSlice> {
        Ref::map(self.state.borrow(), |state| state.directory.pending_ces())
    }

    /// MAC CEs queued across all UEs, ConRes not included.
    pub fn nof_queued_ces(&self) -> usize {
        self.state.borrow().ces.len()
    }

    pub fn nof_dl_qos_rows(&self) -> usize {
        self.state.borrow().dl_qos.len()
    }

    pub fn nof_ul_qos_rows(&self) -> usize {
        self.state.borrow().ul_qos.len()
    }
}
