//! RAN slice bookkeeping.
//!
//! Every UE keeps, per direction, the aggregate pending bytes of the
//! channels (DL) or groups (UL) bound to each slice. The cell-wide
//! [`UeDirectory`] keeps, per slice, a bitmap of the UEs whose aggregate is
//! non-zero. Both are updated differentially on every mutation so the
//! scheduler never has to scan UEs to find pending data.

use arrayvec::ArrayVec;
use bitvec::{slice::BitSlice, vec::BitVec};

use crate::mac::{RanSliceId, UeIndex};

/// Maximum number of distinct slices one UE can be bound to per direction.
pub const MAX_RAN_SLICES_PER_UE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Direction {
    Dl,
    Ul,
}

#[derive(Debug, Clone, Copy)]
struct SlicePending {
    slice_id: RanSliceId,
    pending_bytes: u32,
}

/// Per-UE aggregate pending bytes of each slice, CE bytes excluded.
#[derive(Debug, Default)]
pub(super) struct SlicePendingMap {
    entries: ArrayVec<SlicePending, MAX_RAN_SLICES_PER_UE>,
}

impl SlicePendingMap {
    pub fn get(&self, slice_id: RanSliceId) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.slice_id == slice_id)
            .map(|e| e.pending_bytes)
    }

    fn get_mut(&mut self, slice_id: RanSliceId) -> Option<&mut u32> {
        self.entries
            .iter_mut()
            .find(|e| e.slice_id == slice_id)
            .map(|e| &mut e.pending_bytes)
    }

    pub fn contains(&self, slice_id: RanSliceId) -> bool {
        self.get(slice_id).is_some()
    }

    /// Adds an empty entry; `false` if the map is full.
    pub fn insert(&mut self, slice_id: RanSliceId) -> bool {
        if self.contains(slice_id) {
            return true;
        }
        self.entries
            .try_push(SlicePending {
                slice_id,
                pending_bytes: 0,
            })
            .is_ok()
    }

    pub fn remove(&mut self, slice_id: RanSliceId) {
        if let Some(pos) = self.entries.iter().position(|e| e.slice_id == slice_id) {
            debug_assert_eq!(
                self.entries[pos].pending_bytes, 0,
                "slice entry dropped with pending bytes"
            );
            self.entries.swap_remove(pos);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }
}

/// UEs with pending bytes in one RAN slice.
#[derive(Debug)]
pub(super) struct RanSliceContext {
    pub pending_dl_ues: BitVec,
    pub pending_ul_ues: BitVec,
}

impl RanSliceContext {
    fn new(nof_ues: usize) -> Self {
        RanSliceContext {
            pending_dl_ues: BitVec::repeat(false, nof_ues),
            pending_ul_ues: BitVec::repeat(false, nof_ues),
        }
    }

    fn resize(&mut self, nof_ues: usize) {
        self.pending_dl_ues.resize(nof_ues, false);
        self.pending_ul_ues.resize(nof_ues, false);
    }

    fn ues_mut(&mut self, direction: Direction) -> &mut BitVec {
        match direction {
            Direction::Dl => &mut self.pending_dl_ues,
            Direction::Ul => &mut self.pending_ul_ues,
        }
    }
}

/// Owner of every bitmap indexed by UE index. All of them are resized
/// together when the highest configured UE index changes.
#[derive(Debug)]
pub(super) struct UeDirectory {
    configured: BitVec,
    pending_ces: BitVec,
    slices: Vec<Option<RanSliceContext>>,
}

impl UeDirectory {
    pub fn with_capacity(max_ues: usize) -> Self {
        UeDirectory {
            configured: BitVec::with_capacity(max_ues),
            pending_ces: BitVec::with_capacity(max_ues),
            slices: Vec::new(),
        }
    }

    pub fn contains(&self, ue_index: UeIndex) -> bool {
        bit(&self.configured, ue_index)
    }

    #[cfg(test)]
    pub fn nof_ue_indexes(&self) -> usize {
        self.configured.len()
    }

    pub fn register(&mut self, ue_index: UeIndex) {
        if ue_index.index() >= self.configured.len() {
            self.resize(ue_index.index() + 1);
        }
        self.configured.set(ue_index.index(), true);
    }

    /// Clears every bit of the UE and shrinks the bitmaps to the highest
    /// index still configured.
    pub fn unregister(&mut self, ue_index: UeIndex) {
        if !self.contains(ue_index) {
            return;
        }
        self.configured.set(ue_index.index(), false);
        self.pending_ces.set(ue_index.index(), false);
        for slice in self.slices.iter_mut().flatten() {
            debug_assert!(!bit(&slice.pending_dl_ues, ue_index));
            debug_assert!(!bit(&slice.pending_ul_ues, ue_index));
            slice.pending_dl_ues.set(ue_index.index(), false);
            slice.pending_ul_ues.set(ue_index.index(), false);
        }
        let len = self.configured.last_one().map_or(0, |last| last + 1);
        self.resize(len);
    }

    fn resize(&mut self, nof_ues: usize) {
        self.configured.resize(nof_ues, false);
        self.pending_ces.resize(nof_ues, false);
        for slice in self.slices.iter_mut().flatten() {
            slice.resize(nof_ues);
        }
    }

    pub fn set_pending_ces(&mut self, ue_index: UeIndex, pending: bool) {
        self.pending_ces.set(ue_index.index(), pending);
    }

    pub fn pending_ces(&self) -> &BitSlice {
        &self.pending_ces
    }

    /// Creates the slice context on first use.
    pub fn ensure_slice(&mut self, slice_id: RanSliceId) {
        if slice_id.index() >= self.slices.len() {
            self.slices.resize_with(slice_id.index() + 1, || None);
        }
        let nof_ues = self.configured.len();
        self.slices[slice_id.index()].get_or_insert_with(|| RanSliceContext::new(nof_ues));
    }

    pub fn slice(&self, slice_id: RanSliceId) -> Option<&RanSliceContext> {
        self.slices.get(slice_id.index()).and_then(Option::as_ref)
    }

    #[cfg(test)]
    pub fn is_pending(&self, direction: Direction, slice_id: RanSliceId, ue_index: UeIndex) -> bool {
        self.slice(slice_id).is_some_and(|slice| match direction {
            Direction::Dl => bit(&slice.pending_dl_ues, ue_index),
            Direction::Ul => bit(&slice.pending_ul_ues, ue_index),
        })
    }

    fn set_pending(&mut self, direction: Direction, slice_id: RanSliceId, ue_index: UeIndex, pending: bool) {
        match self.slices.get_mut(slice_id.index()).and_then(Option::as_mut) {
            Some(slice) => slice.ues_mut(direction).set(ue_index.index(), pending),
            None => debug_assert!(false, "{slice_id} was never created"),
        }
    }
}

fn bit(bits: &BitSlice, ue_index: UeIndex) -> bool {
    bits.get(ue_index.index()).is_some_and(|b| *b)
}

/// Moves a slice aggregate from a contribution of `old` bytes to `new` bytes
/// and flips the slice bitmap bit when the aggregate crosses zero.
pub(super) fn apply_slice_delta(
    slices: &mut SlicePendingMap,
    directory: &mut UeDirectory,
    direction: Direction,
    ue_index: UeIndex,
    slice_id: RanSliceId,
    old: u32,
    new: u32,
) {
    if old == new {
        return;
    }
    let Some(pending) = slices.get_mut(slice_id) else {
        debug_assert!(false, "{ue_index} has no entry for {slice_id}");
        return;
    };
    let before = *pending;
    debug_assert!(before.saturating_add(new) >= old, "slice aggregate would go negative");
    *pending = before.saturating_add(new).saturating_sub(old);
    let after = *pending;
    if (before == 0) != (after == 0) {
        directory.set_pending(direction, slice_id, ue_index, after > 0);
    }
}
