//! Kernel-side accelerator context
//!
//! A kernel sees its backend only through [`Acc`]: index queries, the block
//! barrier, the block-shared allocator and warp votes. The associated types
//! are fixed per backend, so a kernel compiles once per backend with no
//! runtime dispatch.
//!
//! Lanes are grouped into warps of [`Acc::warp_size`] consecutive linear
//! lanes; the last warp of a block may be partial. Host backends use a warp
//! size of 1.

use std::future::Future;

use polyacc_core::{BitOps, Element, Vector};

use crate::block::{BlockPredicate, BlockReduce, BlockSync, NoOpSync, SharedAlloc, SharedSlice};
use crate::error::Result;
use crate::workdiv::WorkDiv;

/// What one lane of a launch can query and do
pub trait Acc<const N: usize> {
    /// Block barrier implementation
    type Barrier: BlockSync;
    /// Block-shared allocator implementation
    type SharedMem: SharedAlloc;
    /// Barrier over the lanes of one warp
    type Warp: BlockSync;

    /// Work division of the launch
    fn work_div(&self) -> &WorkDiv<N>;

    /// Index of this lane's block in the grid
    fn grid_block_idx(&self) -> Vector<usize, N>;

    /// Index of this lane inside its block
    fn block_thread_idx(&self) -> Vector<usize, N>;

    fn block_sync(&self) -> &Self::Barrier;

    fn block_shared(&self) -> &Self::SharedMem;

    fn warp_sync(&self) -> &Self::Warp;

    /// Lanes per warp, a power of two
    fn warp_size(&self) -> usize;

    /// Index of this lane in the whole grid
    fn grid_thread_idx(&self) -> Vector<usize, N> {
        self.grid_block_idx() * self.work_div().block_thread_extent() + self.block_thread_idx()
    }

    fn grid_block_linear_idx(&self) -> usize {
        self.grid_block_idx().linearize(&self.work_div().grid_block_extent())
    }

    fn block_thread_linear_idx(&self) -> usize {
        self.block_thread_idx().linearize(&self.work_div().block_thread_extent())
    }

    fn grid_thread_linear_idx(&self) -> usize {
        self.grid_thread_idx().linearize(&self.work_div().grid_thread_extent())
    }

    /// First element index handled by this lane
    fn elem_origin(&self) -> Vector<usize, N> {
        self.grid_thread_idx() * self.work_div().thread_elem_extent()
    }

    /// Every element index handled by this lane, row-major
    fn elem_indices(&self) -> impl Iterator<Item = Vector<usize, N>> {
        let origin = self.elem_origin();
        let elems = self.work_div().thread_elem_extent();
        (0..elems.prod()).map(move |i| origin + Vector::delinearize(i, &elems))
    }

    /// Wait for every lane of the block
    fn sync_block_threads(&self) -> impl Future<Output = ()> {
        self.block_sync().sync()
    }

    /// Wait for every lane of the block and reduce their predicates
    fn sync_block_threads_predicate(&self, op: BlockPredicate, predicate: bool) -> impl Future<Output = usize> {
        self.block_sync().sync_predicate(op, predicate)
    }

    /// Reserve `len` block-shared elements
    fn alloc_shared<T: Element>(&self, len: usize) -> impl Future<Output = Result<SharedSlice<'_, T>>> {
        self.block_shared().alloc(len)
    }

    /// The dynamic block-shared area, viewed as `T`
    fn dyn_shared<T: Element>(&self) -> SharedSlice<'_, T> {
        self.block_shared().dyn_shared()
    }

    /// Position of this lane inside its warp
    fn lane_in_warp(&self) -> usize {
        self.block_thread_linear_idx() % self.warp_size()
    }

    /// Whether `predicate` holds on every lane of the warp.
    ///
    /// Every lane of the warp must call this, like a block barrier.
    fn warp_all(&self, predicate: bool) -> impl Future<Output = bool> {
        let vote = self.warp_sync().sync_predicate(BlockPredicate::And, predicate);
        async move { vote.await != 0 }
    }

    /// Whether `predicate` holds on any lane of the warp
    fn warp_any(&self, predicate: bool) -> impl Future<Output = bool> {
        let vote = self.warp_sync().sync_predicate(BlockPredicate::Or, predicate);
        async move { vote.await != 0 }
    }

    /// Bit `i` is set when `predicate` holds on lane `i` of the warp
    fn warp_ballot(&self, predicate: bool) -> impl Future<Output = u64> {
        let bit = u64::from(predicate) << self.lane_in_warp();
        self.warp_sync().sync_reduce(BlockReduce::BitOr, bit)
    }

    /// One bit per lane present in this warp
    fn warp_active_mask(&self) -> impl Future<Output = u64> {
        self.warp_ballot(true)
    }

    /// Number of set bits in `value`
    fn popcount<T: BitOps>(&self, value: T) -> u32 {
        value.popcount()
    }

    /// 1-based index of the lowest set bit of `value`, 0 when none is set
    fn ffs<T: BitOps>(&self, value: T) -> u32 {
        value.ffs()
    }
}

/// Accelerator context of one lane, generic over the block machinery
pub struct LaneAcc<'b, const N: usize, S, A, W = NoOpSync> {
    work_div: &'b WorkDiv<N>,
    block_idx: Vector<usize, N>,
    thread_idx: Vector<usize, N>,
    sync: &'b S,
    shared: A,
    warp: &'b W,
    warp_size: usize,
}

impl<'b, const N: usize, S: BlockSync, A: SharedAlloc> LaneAcc<'b, N, S, A> {
    pub(crate) fn new(
        work_div: &'b WorkDiv<N>,
        block_idx: Vector<usize, N>,
        lane: usize,
        sync: &'b S,
        shared: A,
    ) -> Self {
        Self {
            work_div,
            block_idx,
            thread_idx: Vector::delinearize(lane, &work_div.block_thread_extent()),
            sync,
            shared,
            warp: &NoOpSync,
            warp_size: 1,
        }
    }
}

impl<'b, const N: usize, S: BlockSync, A: SharedAlloc, W: BlockSync> LaneAcc<'b, N, S, A, W> {
    /// Group this lane into warps of `warp_size` lanes joined by `warp`
    pub(crate) fn with_warp<V: BlockSync>(self, warp: &'b V, warp_size: usize) -> LaneAcc<'b, N, S, A, V> {
        LaneAcc {
            work_div: self.work_div,
            block_idx: self.block_idx,
            thread_idx: self.thread_idx,
            sync: self.sync,
            shared: self.shared,
            warp,
            warp_size,
        }
    }
}

impl<const N: usize, S: BlockSync, A: SharedAlloc, W: BlockSync> Acc<N> for LaneAcc<'_, N, S, A, W> {
    type Barrier = S;
    type SharedMem = A;
    type Warp = W;

    fn work_div(&self) -> &WorkDiv<N> {
        self.work_div
    }

    fn grid_block_idx(&self) -> Vector<usize, N> {
        self.block_idx
    }

    fn block_thread_idx(&self) -> Vector<usize, N> {
        self.thread_idx
    }

    fn block_sync(&self) -> &S {
        self.sync
    }

    fn block_shared(&self) -> &A {
        &self.shared
    }

    fn warp_sync(&self) -> &W {
        self.warp
    }

    fn warp_size(&self) -> usize {
        self.warp_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::NoSyncSharedAlloc;
    use futures::executor::block_on;

    #[test]
    fn test_index_queries() {
        let wd = WorkDiv::new([3, 4], [2, 5], [1, 2]).unwrap();
        let shared = NoSyncSharedAlloc::new(0).unwrap();
        let acc = LaneAcc::new(&wd, Vector::new([1, 2]), 7, &NoOpSync, &shared);

        assert_eq!(acc.block_thread_idx(), Vector::new([1, 2]));
        assert_eq!(acc.block_thread_linear_idx(), 7);
        assert_eq!(acc.grid_thread_idx(), Vector::new([3, 12]));
        assert_eq!(acc.grid_block_linear_idx(), 6);
        assert_eq!(acc.grid_thread_linear_idx(), 3 * 20 + 12);
        assert_eq!(
            acc.elem_indices().collect::<Vec<_>>(),
            vec![Vector::new([3, 24]), Vector::new([3, 25])]
        );
    }

    #[test]
    fn test_single_lane_warp_votes() {
        let wd = WorkDiv::linear(1, 1, 1).unwrap();
        let shared = NoSyncSharedAlloc::new(0).unwrap();
        let acc = LaneAcc::new(&wd, Vector::new([0]), 0, &NoOpSync, &shared);

        assert_eq!(acc.warp_size(), 1);
        assert_eq!(acc.lane_in_warp(), 0);
        assert!(block_on(acc.warp_all(true)));
        assert!(!block_on(acc.warp_any(false)));
        assert_eq!(block_on(acc.warp_ballot(true)), 1);
        assert_eq!(block_on(acc.warp_ballot(false)), 0);
        assert_eq!(block_on(acc.warp_active_mask()), 1);
    }

    #[test]
    fn test_intrinsics_forward() {
        let wd = WorkDiv::linear(1, 1, 1).unwrap();
        let shared = NoSyncSharedAlloc::new(0).unwrap();
        let acc = LaneAcc::new(&wd, Vector::new([0]), 0, &NoOpSync, &shared);

        assert_eq!(acc.popcount(0xF0u32), 4);
        assert_eq!(acc.ffs(0xF0u32), 5);
        assert_eq!(acc.ffs(0i64), 0);
    }

    #[test]
    fn test_lane_in_warp_wraps() {
        let wd = WorkDiv::linear(1, 8, 1).unwrap();
        let shared = NoSyncSharedAlloc::new(0).unwrap();
        let acc = LaneAcc::new(&wd, Vector::new([0]), 6, &NoOpSync, &shared).with_warp(&NoOpSync, 4);

        assert_eq!(acc.warp_size(), 4);
        assert_eq!(acc.lane_in_warp(), 2);
    }
}
