//! Per-bearer throughput tracking.
//!
//! Every GBR logical channel (DL) or logical channel group (UL) owns one row
//! of a [`QosTracker`]. Allocations add to the row's per-slot byte counter and
//! [`QosTracker::slot_indication`] folds that counter into the row's
//! [`SlidingWindow`] once per slot.

mod rate;
mod sliding_window;

pub use rate::BitRate;
pub use sliding_window::{SlidingWindow, WindowSample};

use crate::soa::{RowId, Table};

pub(crate) struct QosTracker {
    /// Average bytes per slot and bytes scheduled in the current slot.
    rows: Table<(Vec<SlidingWindow<u64>>, Vec<u64>)>,
}

impl QosTracker {
    pub fn with_capacity(capacity: usize) -> Self {
        QosTracker {
            rows: Table::with_capacity(capacity),
        }
    }

    pub fn attach(&mut self, window_slots: usize) -> RowId {
        self.rows.insert((SlidingWindow::new(window_slots), 0))
    }

    /// Changes the averaging window of a row. Collected samples are dropped
    /// only if the size actually changes.
    pub fn set_window(&mut self, row: RowId, window_slots: usize) {
        if let Some((average, _)) = self.rows.row_mut(row) {
            if average.window_size() != window_slots {
                average.resize(window_slots);
            }
        }
    }

    pub fn detach(&mut self, row: RowId) -> bool {
        self.rows.erase(row)
    }

    pub fn record_scheduled(&mut self, row: RowId, bytes: u32) {
        if let Some((_, scheduled)) = self.rows.row_mut(row) {
            *scheduled += u64::from(bytes);
        }
    }

    pub fn slot_indication(&mut self) {
        let (averages, scheduled) = self.rows.columns_mut();
        for (average, bytes) in averages.iter_mut().zip(scheduled.iter_mut()) {
            average.push(*bytes);
            *bytes = 0;
        }
    }

    pub fn average_bytes_per_slot(&self, row: RowId) -> Option<f64> {
        self.rows.row(row).map(|(average, _)| average.average())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_indication_pushes_and_resets() {
        let mut tracker = QosTracker::with_capacity(2);
        let a = tracker.attach(4);
        let b = tracker.attach(2);

        tracker.record_scheduled(a, 100);
        tracker.record_scheduled(a, 100);
        tracker.record_scheduled(b, 10);
        tracker.slot_indication();
        assert_eq!(tracker.average_bytes_per_slot(a), Some(50.0));
        assert_eq!(tracker.average_bytes_per_slot(b), Some(5.0));

        // Nothing scheduled in the next slot.
        tracker.slot_indication();
        assert_eq!(tracker.average_bytes_per_slot(a), Some(50.0));
        assert_eq!(tracker.average_bytes_per_slot(b), Some(5.0));
        tracker.slot_indication();
        assert_eq!(tracker.average_bytes_per_slot(b), Some(0.0));
    }

    #[test]
    fn test_detach_and_window_change() {
        let mut tracker = QosTracker::with_capacity(2);
        let a = tracker.attach(4);
        tracker.record_scheduled(a, 40);
        tracker.slot_indication();

        tracker.set_window(a, 4);
        assert_eq!(tracker.average_bytes_per_slot(a), Some(10.0));
        tracker.set_window(a, 8);
        assert_eq!(tracker.average_bytes_per_slot(a), Some(0.0));

        assert!(tracker.detach(a));
        assert_eq!(tracker.len(), 0);
        assert_eq!(tracker.average_bytes_per_slot(a), None);
    }
}
