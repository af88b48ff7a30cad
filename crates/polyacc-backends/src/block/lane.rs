//! Identity of the lane currently executing on this OS thread
//!
//! Backends enter a lane before running or polling its kernel future.
//! Lane 0 of a block is its master.

use std::cell::Cell;

thread_local! {
    static CURRENT_LANE: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Linear index of the lane running on this thread, if any
pub fn current_lane() -> Option<usize> {
    CURRENT_LANE.with(Cell::get)
}

/// Whether this thread is running its block's master lane
pub fn is_master_lane() -> bool {
    current_lane() == Some(0)
}

/// Restores the previous lane identity on drop
pub(crate) struct LaneGuard {
    previous: Option<usize>,
}

impl LaneGuard {
    pub(crate) fn enter(lane: usize) -> Self {
        let previous = CURRENT_LANE.with(|cell| cell.replace(Some(lane)));
        Self { previous }
    }
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        CURRENT_LANE.with(|cell| cell.set(self.previous));
    }
}
