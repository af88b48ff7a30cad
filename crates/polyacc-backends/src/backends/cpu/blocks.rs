//! Parallel blocks on the rayon pool, one lane each

use polyacc_tracing::perf_span;
use rayon::prelude::*;

use super::host_acc_props;
use crate::backend::{Backend, Kernel};
use crate::backends::common::{run_single_lane, Launch};
use crate::block::NoSyncSharedAlloc;
use crate::device::CpuDevice;
use crate::error::Result;
use crate::workdiv::{AccProps, WorkDiv};

/// Runs blocks in parallel on the global rayon pool
#[derive(Debug, Clone)]
pub struct CpuBlocks {
    device: CpuDevice,
}

impl CpuBlocks {
    pub fn new(device: CpuDevice) -> Self {
        Self { device }
    }
}

impl Backend for CpuBlocks {
    type Device = CpuDevice;

    fn name(&self) -> &'static str {
        "cpu_blocks"
    }

    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn acc_props(&self) -> AccProps {
        host_acc_props(&self.device, 1)
    }

    fn launch<const N: usize, K: Kernel<N>>(&self, work_div: &WorkDiv<N>, kernel: &K) -> Result<()> {
        let launch = Launch::prepare(self.name(), &self.acc_props(), work_div, kernel)?;
        let _span = perf_span!(
            "cpu_blocks_launch",
            blocks = work_div.grid_block_count(),
            workers = rayon::current_num_threads()
        );

        let outcomes: Vec<Result<()>> = (0..work_div.grid_block_count())
            .into_par_iter()
            .map(|block| {
                let shared = NoSyncSharedAlloc::from_region(launch.shared_region()?);
                run_single_lane(kernel, work_div, block, shared)
            })
            .collect();
        launch.finish(work_div, outcomes)
    }
}
