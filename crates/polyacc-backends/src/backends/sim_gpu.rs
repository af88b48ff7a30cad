//! Simulated accelerator backend
//!
//! Blocks are spread over a dedicated rayon pool with one worker per
//! simulated multiprocessor. Within a block every lane is a scoped OS
//! thread, and block-shared memory is carved out of one region per block
//! at offsets every lane computes identically:
//!
//! ```text
//!   pool worker "simgpu-sm0" ──► block 0 ─┬─ lane 0 ┐
//!                                         ├─ lane 1 ├─ ThreadBarrier
//!                                         └─ lane 2 ┘  SharedRegion
//!   pool worker "simgpu-sm1" ──► block 1 ─┬─ ...
//! ```

use std::fmt;
use std::sync::Arc;

use polyacc_tracing::perf_span;
use rayon::prelude::*;

use crate::backend::{Backend, Kernel};
use crate::backends::common::{run_thread_group, Launch};
use crate::block::{BuiltInSharedAlloc, ThreadBarrier};
use crate::device::{Device, SimGpuDevice};
use crate::error::{BackendError, Result};
use crate::workdiv::{AccProps, WorkDiv};

/// Launches kernels on a [`SimGpuDevice`]
#[derive(Clone)]
pub struct SimGpu {
    device: SimGpuDevice,
    pool: Arc<rayon::ThreadPool>,
}

impl SimGpu {
    /// Create the backend and its multiprocessor pool.
    pub fn new(device: SimGpuDevice) -> Result<Self> {
        let workers = device.props().multiprocessor_count.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("simgpu-sm{i}"))
            .build()
            .map_err(|e| BackendError::execution_error(format!("failed to start multiprocessor pool: {e}")))?;

        tracing::debug!(device = %device.id(), workers, "sim_gpu_backend_created");
        Ok(Self {
            device,
            pool: Arc::new(pool),
        })
    }

    /// Number of blocks that execute concurrently
    pub fn multiprocessor_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl fmt::Debug for SimGpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimGpu")
            .field("device", &self.device)
            .field("multiprocessors", &self.multiprocessor_count())
            .finish()
    }
}

impl Backend for SimGpu {
    type Device = SimGpuDevice;

    fn name(&self) -> &'static str {
        "sim_gpu"
    }

    fn device(&self) -> &SimGpuDevice {
        &self.device
    }

    fn acc_props(&self) -> AccProps {
        let props = self.device.props();
        AccProps {
            grid_block_extent_max: props.grid_block_extent_max,
            block_thread_extent_max: props.block_threads_max,
            block_threads_max: props.block_threads_max,
            thread_elem_extent_max: usize::MAX,
            shared_mem_bytes_max: props.shared_mem_bytes_max,
            warp_size: props.warp_size,
        }
    }

    fn launch<const N: usize, K: Kernel<N>>(&self, work_div: &WorkDiv<N>, kernel: &K) -> Result<()> {
        let launch = Launch::prepare(self.name(), &self.acc_props(), work_div, kernel)?;
        let _span = perf_span!(
            "sim_gpu_launch",
            device = self.device.id().to_string(),
            blocks = work_div.grid_block_count(),
            lanes = work_div.block_thread_count()
        );

        let warp_size = self.device.props().warp_size;
        let outcomes: Vec<Result<()>> = self.pool.install(|| {
            (0..work_div.grid_block_count())
                .into_par_iter()
                .map(|block| {
                    let region = launch.shared_region()?;
                    let barrier = ThreadBarrier::new(work_div.block_thread_count());
                    run_thread_group(kernel, work_div, block, &barrier, warp_size, || {
                        BuiltInSharedAlloc::new(&region)
                    })
                })
                .collect()
        });
        launch.finish(work_div, outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acc::Acc;
    use crate::config::SimGpuConfig;
    use crate::error::CapacityError;
    use crate::mem::{Accessor, Buffer};

    fn small_gpu() -> SimGpuDevice {
        let config = SimGpuConfig {
            multiprocessor_count: 2,
            block_threads_max: 64,
            shared_mem_bytes_max: 1024,
            ..SimGpuConfig::default()
        };
        SimGpuDevice::new(0, &config)
    }

    /// Each block sums its lanes' indices through shared memory
    struct BlockSum<'a> {
        out: Accessor<'a, u32, 1>,
    }

    impl Kernel<1> for BlockSum<'_> {
        async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
            let total = acc.alloc_shared::<u32>(1).await?;
            total.atomic(0, crate::atomic::AtomicOp::Add, acc.grid_thread_linear_idx() as u32);
            acc.sync_block_threads().await;
            if acc.block_thread_linear_idx() == 0 {
                // SAFETY: read-only after the barrier; one writer per block.
                unsafe { self.out.set([acc.grid_block_linear_idx()], total.load(0)) };
            }
            Ok(())
        }

        fn block_shared_mem_bytes(&self, _work_div: &WorkDiv<1>) -> usize {
            4
        }
    }

    #[test]
    fn test_blocks_see_private_shared_memory() {
        let device = small_gpu();
        let backend = SimGpu::new(device.clone()).unwrap();
        assert_eq!(backend.multiprocessor_count(), 2);

        let mut out = Buffer::<u32, _, 1>::allocate(&device, [3]).unwrap();
        let wd = WorkDiv::linear(3, 4, 1).unwrap();
        backend.launch(&wd, &BlockSum { out: out.accessor_mut() }).unwrap();
        assert_eq!(out.to_vec(), vec![6, 22, 38]);
    }

    struct Greedy;

    impl Kernel<1> for Greedy {
        async fn run<A: Acc<1>>(&self, _acc: &A) -> Result<()> {
            Ok(())
        }

        fn block_shared_mem_bytes(&self, _work_div: &WorkDiv<1>) -> usize {
            4096
        }
    }

    #[test]
    fn test_shared_memory_limit_checked_before_launch() {
        let backend = SimGpu::new(small_gpu()).unwrap();
        let wd = WorkDiv::linear(1, 1, 1).unwrap();
        let err = backend.launch(&wd, &Greedy).unwrap_err();
        assert!(matches!(
            err,
            BackendError::Capacity(CapacityError::SharedMemoryExceeded { requested: 4096, limit: 1024 })
        ));
    }

    #[test]
    fn test_block_too_large_for_device() {
        let backend = SimGpu::new(small_gpu()).unwrap();
        let wd = WorkDiv::linear(1, 128, 1).unwrap();
        assert!(matches!(backend.launch(&wd, &Greedy), Err(BackendError::Config(_))));
    }
}
