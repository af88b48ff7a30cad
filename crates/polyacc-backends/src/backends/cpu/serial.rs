//! Sequential blocks, one lane each

use polyacc_tracing::perf_span;

use super::host_acc_props;
use crate::backend::{Backend, Kernel};
use crate::backends::common::{run_single_lane, Launch};
use crate::block::NoSyncSharedAlloc;
use crate::device::CpuDevice;
use crate::error::Result;
use crate::workdiv::{AccProps, WorkDiv};

/// Runs blocks one after another on the calling thread
#[derive(Debug, Clone)]
pub struct CpuSerial {
    device: CpuDevice,
}

impl CpuSerial {
    pub fn new(device: CpuDevice) -> Self {
        Self { device }
    }
}

impl Backend for CpuSerial {
    type Device = CpuDevice;

    fn name(&self) -> &'static str {
        "cpu_serial"
    }

    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn acc_props(&self) -> AccProps {
        host_acc_props(&self.device, 1)
    }

    fn launch<const N: usize, K: Kernel<N>>(&self, work_div: &WorkDiv<N>, kernel: &K) -> Result<()> {
        let launch = Launch::prepare(self.name(), &self.acc_props(), work_div, kernel)?;
        let _span = perf_span!("cpu_serial_launch", blocks = work_div.grid_block_count());

        let mut outcomes = Vec::with_capacity(1);
        for block in 0..work_div.grid_block_count() {
            let outcome = launch.shared_region().map_err(Into::into).and_then(|region| {
                run_single_lane(kernel, work_div, block, NoSyncSharedAlloc::from_region(region))
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
    use crate::error::BackendError;
    use crate::mem::{Accessor, Buffer};
    use polyacc_core::Vector;

    struct BlockIds<'a> {
        out: Accessor<'a, u32, 2>,
    }

    impl Kernel<2> for BlockIds<'_> {
        async fn run<A: Acc<2>>(&self, acc: &A) -> Result<()> {
            let idx = acc.grid_thread_idx();
            // SAFETY: one lane per element.
            unsafe { self.out.set(idx, acc.grid_block_linear_idx() as u32) };
            Ok(())
        }
    }

    #[test]
    fn test_every_block_runs_once() {
        let device = CpuDevice::new();
        let backend = CpuSerial::new(device.clone());
        let mut buf = Buffer::<u32, _, 2>::allocate(&device, [2, 3]).unwrap();
        let wd = WorkDiv::new([2, 3], [1, 1], [1, 1]).unwrap();
        backend.launch(&wd, &BlockIds { out: buf.accessor_mut() }).unwrap();
        assert_eq!(buf.to_vec(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_multi_lane_blocks_rejected() {
        let device = CpuDevice::new();
        let backend = CpuSerial::new(device.clone());
        let mut buf = Buffer::<u32, _, 2>::allocate(&device, [2, 2]).unwrap();
        let wd = WorkDiv::new([1, 1], [2, 2], [1, 1]).unwrap();
        let err = backend.launch(&wd, &BlockIds { out: buf.accessor_mut() }).unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));
        assert_eq!(buf.accessor().get(Vector::new([0, 0])), 0);
    }
}
