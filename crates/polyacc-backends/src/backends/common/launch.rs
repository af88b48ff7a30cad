//! Launch preparation and single-lane block execution

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use futures::executor::block_on;
use polyacc_core::Vector;
use polyacc_tracing::performance;

use crate::acc::LaneAcc;
use crate::backend::Kernel;
use crate::block::lane::LaneGuard;
use crate::block::shared::SharedRegion;
use crate::block::{NoOpSync, SharedAlloc};
use crate::error::{AllocationError, BackendError, CapacityError, Result};
use crate::workdiv::{AccProps, WorkDiv};

/// A validated launch: shared bytes per block and the start time
pub(crate) struct Launch {
    backend: &'static str,
    shared_bytes: usize,
    dyn_shared_bytes: usize,
    start: Instant,
}

impl Launch {
    /// Validate `work_div` and the kernel's declared shared memory before
    /// any lane runs
    pub(crate) fn prepare<const N: usize, K: Kernel<N>>(
        backend: &'static str,
        props: &AccProps,
        work_div: &WorkDiv<N>,
        kernel: &K,
    ) -> Result<Self> {
        if let Err(err) = work_div.validate(props) {
            tracing::warn!(backend, work_div = %work_div, error = %err, "kernel_launch_rejected");
            return Err(err.into());
        }

        let shared_bytes = kernel.block_shared_mem_bytes(work_div);
        let dyn_shared_bytes = kernel.dyn_shared_mem_bytes(work_div);
        let total = shared_bytes.saturating_add(dyn_shared_bytes);
        if total > props.shared_mem_bytes_max {
            tracing::warn!(
                backend,
                shared_bytes,
                dyn_shared_bytes,
                limit = props.shared_mem_bytes_max,
                "kernel_shared_memory_rejected"
            );
            return Err(CapacityError::SharedMemoryExceeded {
                requested: total,
                limit: props.shared_mem_bytes_max,
            }
            .into());
        }

        tracing::debug!(backend, work_div = %work_div, shared_bytes, dyn_shared_bytes, "kernel_launch");
        Ok(Self {
            backend,
            shared_bytes,
            dyn_shared_bytes,
            start: Instant::now(),
        })
    }

    /// Fresh zeroed shared memory for one block
    pub(crate) fn shared_region(&self) -> std::result::Result<SharedRegion, AllocationError> {
        SharedRegion::with_dynamic(self.shared_bytes, self.dyn_shared_bytes)
    }

    /// Record the launch and pick the first failure in block order
    pub(crate) fn finish<const N: usize>(self, work_div: &WorkDiv<N>, outcomes: Vec<Result<()>>) -> Result<()> {
        performance::record_launch(
            self.backend,
            work_div.grid_block_count(),
            work_div.block_thread_count(),
            self.start.elapsed().as_micros() as u64,
        );
        let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
        if failed > 0 {
            tracing::debug!(backend = self.backend, failed_blocks = failed, "kernel_launch_failed");
        }
        outcomes.into_iter().collect()
    }
}

/// Grid index of linear block `block`
pub(crate) fn block_index<const N: usize>(work_div: &WorkDiv<N>, block: usize) -> Vector<usize, N> {
    Vector::delinearize(block, &work_div.grid_block_extent())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run a block that has exactly one lane
pub(crate) fn run_single_lane<const N: usize, K, A>(kernel: &K, work_div: &WorkDiv<N>, block: usize, shared: A) -> Result<()>
where
    K: Kernel<N>,
    A: SharedAlloc,
{
    let _lane = LaneGuard::enter(0);
    let acc = LaneAcc::new(work_div, block_index(work_div, block), 0, &NoOpSync, shared);
    panic::catch_unwind(AssertUnwindSafe(|| block_on(kernel.run(&acc)))).unwrap_or_else(|payload| {
        Err(BackendError::KernelPanicked {
            block,
            lane: 0,
            message: panic_message(&*payload),
        })
    })
}
