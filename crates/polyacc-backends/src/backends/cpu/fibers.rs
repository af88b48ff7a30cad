//! Sequential blocks, lanes as cooperative futures on the calling thread

use polyacc_tracing::perf_span;

use super::host_acc_props;
use crate::acc::LaneAcc;
use crate::backend::{Backend, Kernel};
use crate::backends::common::{block_index, run_fibers, Launch};
use crate::block::{is_master_lane, FiberBarrier, MasterSyncSharedAlloc};
use crate::config::HostConfig;
use crate::device::CpuDevice;
use crate::error::Result;
use crate::workdiv::{AccProps, WorkDiv};

/// Runs each block's lanes as futures polled round-robin on one thread
#[derive(Debug, Clone)]
pub struct CpuFibers {
    device: CpuDevice,
    block_threads_max: usize,
}

impl CpuFibers {
    pub fn new(device: CpuDevice) -> Self {
        Self::with_config(device, &HostConfig::default())
    }

    pub fn with_config(device: CpuDevice, config: &HostConfig) -> Self {
        Self {
            device,
            block_threads_max: config.fiber_block_threads_max,
        }
    }

    fn run_block<const N: usize, K: Kernel<N>>(
        &self,
        kernel: &K,
        work_div: &WorkDiv<N>,
        block: usize,
        launch: &Launch,
    ) -> Result<()> {
        let lanes = work_div.block_thread_count();
        let block_idx = block_index(work_div, block);
        let region = launch.shared_region()?;
        let barrier = FiberBarrier::new(lanes);
        let shared = MasterSyncSharedAlloc::new(&region, &barrier, is_master_lane as fn() -> bool);

        let accs: Vec<_> = (0..lanes)
            .map(|lane| LaneAcc::new(work_div, block_idx, lane, &barrier, &shared))
            .collect();
        let fibers: Vec<_> = accs.iter().map(|acc| kernel.run(acc)).collect();
        run_fibers(block, fibers, || barrier.arrivals())
    }
}

impl Backend for CpuFibers {
    type Device = CpuDevice;

    fn name(&self) -> &'static str {
        "cpu_fibers"
    }

    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn acc_props(&self) -> AccProps {
        host_acc_props(&self.device, self.block_threads_max)
    }

    fn launch<const N: usize, K: Kernel<N>>(&self, work_div: &WorkDiv<N>, kernel: &K) -> Result<()> {
        let launch = Launch::prepare(self.name(), &self.acc_props(), work_div, kernel)?;
        let _span = perf_span!(
            "cpu_fibers_launch",
            blocks = work_div.grid_block_count(),
            lanes = work_div.block_thread_count()
        );

        let mut outcomes = Vec::new();
        for block in 0..work_div.grid_block_count() {
            let outcome = self.run_block(kernel, work_div, block, &launch);
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        launch.finish(work_div, outcomes)
    }
}
