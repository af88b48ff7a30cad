//! One block with one OS thread per lane

use std::panic::{self, AssertUnwindSafe};

use futures::executor::block_on;

use super::launch::{block_index, panic_message};
use crate::acc::LaneAcc;
use crate::backend::Kernel;
use crate::block::lane::LaneGuard;
use crate::block::{SharedAlloc, ThreadBarrier};
use crate::error::{BackendError, Result};
use crate::workdiv::WorkDiv;

/// Run every lane of `block` on its own scoped thread.
///
/// Consecutive linear lanes form warps of `warp_size`, each joined by its own
/// barrier. A lane that fails or panics poisons its block and warp barriers
/// so the others are not left waiting. A lane that returns while its peers
/// wait on a barrier strands them; that is reported as `Deadlock`. Otherwise
/// returns the first failure in lane order.
pub(crate) fn run_thread_group<const N: usize, K, A, M>(
    kernel: &K,
    work_div: &WorkDiv<N>,
    block: usize,
    barrier: &ThreadBarrier,
    warp_size: usize,
    make_shared: M,
) -> Result<()>
where
    K: Kernel<N>,
    A: SharedAlloc,
    M: Fn() -> A + Sync,
{
    let lanes = work_div.block_thread_count();
    let block_idx = block_index(work_div, block);
    let warp_size = warp_size.max(1);
    let warps: Vec<ThreadBarrier> = (0..lanes.div_ceil(warp_size))
        .map(|w| ThreadBarrier::new(warp_size.min(lanes - w * warp_size)))
        .collect();

    let outcomes: Vec<Result<()>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..lanes)
            .map(|lane| {
                let make_shared = &make_shared;
                let warp = &warps[lane / warp_size];
                s.spawn(move || {
                    let _guard = LaneGuard::enter(lane);
                    let acc =
                        LaneAcc::new(work_div, block_idx, lane, barrier, make_shared()).with_warp(warp, warp_size);
                    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| block_on(kernel.run(&acc)))) {
                        Ok(outcome) => outcome,
                        Err(payload) => Err(BackendError::KernelPanicked {
                            block,
                            lane,
                            message: panic_message(&*payload),
                        }),
                    };
                    match &outcome {
                        Ok(()) => {
                            barrier.lane_finished();
                            warp.lane_finished();
                        }
                        Err(err) => {
                            tracing::debug!(block, lane, error = %err, "lane_failed");
                            barrier.poison();
                            warp.poison();
                        }
                    }
                    outcome
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(lane, handle)| {
                handle.join().unwrap_or_else(|payload| {
                    Err(BackendError::KernelPanicked {
                        block,
                        lane,
                        message: panic_message(&*payload),
                    })
                })
            })
            .collect()
    });

    // lanes released from a stranded barrier run on with stale data, their errors are secondary
    if let Some(pending) = barrier.stranded() {
        return Err(BackendError::Deadlock { block, pending, lanes });
    }
    if let Some((warp, pending)) = warps.iter().enumerate().find_map(|(w, b)| b.stranded().map(|p| (w, p))) {
        tracing::debug!(block, warp, pending, "warp_stranded");
        return Err(BackendError::Deadlock { block, pending, lanes });
    }
    outcomes.into_iter().collect()
}
