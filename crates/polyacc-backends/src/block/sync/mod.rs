//! Block-wide synchronization
//!
//! Every lane of a block must reach each barrier before any lane passes it.
//! Three implementations match the three execution shapes:
//!
//! ```text
//! NoOpSync       one lane per block          returns immediately
//! ThreadBarrier  lanes are OS threads        blocks the thread (Condvar)
//! FiberBarrier   lanes are futures, 1 thread Pending until the group arrives
//! ```
//!
//! A reducing barrier additionally folds one value per lane with a
//! [`BlockReduce`] and hands the result to every lane. Predicate votes
//! ([`BlockPredicate`]) and warp ballots are both built on it.

mod fiber;
mod thread;

pub use fiber::FiberBarrier;
pub use thread::ThreadBarrier;

use std::future::{self, Future};

/// Reduction applied by a predicate barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockPredicate {
    /// Number of lanes whose predicate is true
    Count,
    /// 1 when every predicate is true, else 0
    And,
    /// 1 when any predicate is true, else 0
    Or,
}

impl BlockPredicate {
    /// The fold and per-lane value this predicate contributes
    pub fn fold(self, predicate: bool) -> (BlockReduce, u64) {
        let value = u64::from(predicate);
        match self {
            Self::Count => (BlockReduce::Sum, value),
            Self::And => (BlockReduce::BitAnd, value),
            Self::Or => (BlockReduce::BitOr, value),
        }
    }
}

/// Fold applied to one `u64` per lane by a reducing barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReduce {
    /// Wrapping sum
    Sum,
    BitAnd,
    BitOr,
}

impl BlockReduce {
    pub(crate) fn identity(self) -> u64 {
        match self {
            Self::Sum | Self::BitOr => 0,
            Self::BitAnd => u64::MAX,
        }
    }

    pub(crate) fn combine(self, acc: u64, value: u64) -> u64 {
        match self {
            Self::Sum => acc.wrapping_add(value),
            Self::BitAnd => acc & value,
            Self::BitOr => acc | value,
        }
    }
}

/// Barrier shared by the lanes of one block (or of one warp)
pub trait BlockSync {
    /// Lanes that must arrive before the barrier opens
    fn group_size(&self) -> usize;

    /// Wait until every lane of the group has arrived
    fn sync(&self) -> impl Future<Output = ()>;

    /// Wait like [`BlockSync::sync`] and return `op` folded over every
    /// lane's `value`
    fn sync_reduce(&self, op: BlockReduce, value: u64) -> impl Future<Output = u64>;

    /// Wait like [`BlockSync::sync`] and return the group-wide reduction of
    /// every lane's `predicate`
    fn sync_predicate(&self, op: BlockPredicate, predicate: bool) -> impl Future<Output = usize> {
        let (fold, value) = op.fold(predicate);
        let reduced = self.sync_reduce(fold, value);
        async move { reduced.await as usize }
    }
}

/// Barrier for single-lane groups
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSync;

impl BlockSync for NoOpSync {
    fn group_size(&self) -> usize {
        1
    }

    fn sync(&self) -> impl Future<Output = ()> {
        future::ready(())
    }

    fn sync_reduce(&self, op: BlockReduce, value: u64) -> impl Future<Output = u64> {
        future::ready(op.combine(op.identity(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_predicate_folds() {
        let preds = [true, false, true, true];
        let fold = |op: BlockPredicate| {
            let (reduce, _) = op.fold(true);
            preds
                .iter()
                .fold(reduce.identity(), |acc, &p| reduce.combine(acc, op.fold(p).1))
        };
        assert_eq!(fold(BlockPredicate::Count), 3);
        assert_eq!(fold(BlockPredicate::And), 0);
        assert_eq!(fold(BlockPredicate::Or), 1);
    }

    #[test]
    fn test_bit_or_collects_lane_bits() {
        let ballot = [0u64, 1, 3]
            .iter()
            .fold(BlockReduce::BitOr.identity(), |acc, &lane| BlockReduce::BitOr.combine(acc, 1 << lane));
        assert_eq!(ballot, 0b1011);
        assert_eq!(BlockReduce::BitAnd.combine(BlockReduce::BitAnd.identity(), 6), 6);
    }

    #[test]
    fn test_noop_sync() {
        let sync = NoOpSync;
        block_on(sync.sync());
        assert_eq!(block_on(sync.sync_predicate(BlockPredicate::Count, true)), 1);
        assert_eq!(block_on(sync.sync_predicate(BlockPredicate::And, false)), 0);
        assert_eq!(block_on(sync.sync_predicate(BlockPredicate::Or, true)), 1);
        assert_eq!(block_on(sync.sync_reduce(BlockReduce::BitOr, 0b100)), 0b100);
    }
}
