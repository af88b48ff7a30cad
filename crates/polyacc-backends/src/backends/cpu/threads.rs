//! Sequential blocks, one OS thread per lane

use polyacc_tracing::perf_span;

use super::host_acc_props;
use crate::backend::{Backend, Kernel};
use crate::backends::common::{run_thread_group, Launch};
use crate::block::{is_master_lane, MasterSyncSharedAlloc, ThreadBarrier};
use crate::config::HostConfig;
use crate::device::CpuDevice;
use crate::error::Result;
use crate::workdiv::{AccProps, WorkDiv};

/// Runs each block's lanes as scoped OS threads sharing a blocking barrier
#[derive(Debug, Clone)]
pub struct CpuThreads {
    device: CpuDevice,
    block_threads_max: usize,
}

impl CpuThreads {
    pub fn new(device: CpuDevice) -> Self {
        Self::with_config(device, &HostConfig::default())
    }

    pub fn with_config(device: CpuDevice, config: &HostConfig) -> Self {
        Self {
            device,
            block_threads_max: config.block_threads_max,
        }
    }
}

impl Backend for CpuThreads {
    type Device = CpuDevice;

    fn name(&self) -> &'static str {
        "cpu_threads"
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
            "cpu_threads_launch",
            blocks = work_div.grid_block_count(),
            lanes = work_div.block_thread_count()
        );

        let mut outcomes = Vec::new();
        for block in 0..work_div.grid_block_count() {
            let outcome = launch.shared_region().map_err(Into::into).and_then(|region| {
                let barrier = ThreadBarrier::new(work_div.block_thread_count());
                let shared = MasterSyncSharedAlloc::new(&region, &barrier, is_master_lane as fn() -> bool);
                run_thread_group(kernel, work_div, block, &barrier, 1, || &shared)
            });
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        launch.finish(work_div, outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acc::Acc;
    use crate::block::BlockPredicate;
    use crate::error::BackendError;
    use crate::mem::{Accessor, Buffer};

    struct CountOdd<'a> {
        out: Accessor<'a, u32, 1>,
    }

    impl Kernel<1> for CountOdd<'_> {
        async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
            let lane = acc.block_thread_linear_idx();
            let odd = acc.sync_block_threads_predicate(BlockPredicate::Count, lane % 2 == 1).await;
            if lane == 0 {
                // SAFETY: only the master writes.
                unsafe { self.out.set([acc.grid_block_linear_idx()], odd as u32) };
            }
            Ok(())
        }
    }

    #[test]
    fn test_predicate_sync_across_threads() {
        let device = CpuDevice::new();
        let backend = CpuThreads::new(device.clone());
        let mut out = Buffer::<u32, _, 1>::allocate(&device, [2]).unwrap();
        let wd = WorkDiv::linear(2, 7, 1).unwrap();
        backend.launch(&wd, &CountOdd { out: out.accessor_mut() }).unwrap();
        assert_eq!(out.to_vec(), vec![3, 3]);
    }

    struct PanicsOnLaneTwo;

    impl Kernel<1> for PanicsOnLaneTwo {
        async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
            if acc.block_thread_linear_idx() == 2 {
                panic!("lane two failed");
            }
            acc.sync_block_threads().await;
            Ok(())
        }
    }

    #[test]
    fn test_panicking_lane_releases_barrier() {
        let backend = CpuThreads::new(CpuDevice::new());
        let wd = WorkDiv::linear(1, 4, 1).unwrap();
        let err = backend.launch(&wd, &PanicsOnLaneTwo).unwrap_err();
        assert!(matches!(err, BackendError::KernelPanicked { block: 0, lane: 2, .. }));
    }
}
