//! Host CPU backends
//!
//! Four ways to map a grid onto the host:
//!
//! ```text
//! backend     blocks              lanes per block      barrier        shared memory
//! ─────────── ─────────────────── ──────────────────── ────────────── ─────────────────
//! CpuSerial   one after another   1                    NoOpSync       NoSyncSharedAlloc
//! CpuBlocks   rayon pool          1                    NoOpSync       NoSyncSharedAlloc
//! CpuThreads  one after another   one OS thread each   ThreadBarrier  MasterSyncSharedAlloc
//! CpuFibers   one after another   futures on 1 thread  FiberBarrier   MasterSyncSharedAlloc
//! ```
//!
//! # Usage
//!
//! ```rust
//! use polyacc_backends::{Backend, CpuBlocks, CpuDevice, CpuFibers, CpuSerial, CpuThreads};
//!
//! let device = CpuDevice::new();
//! assert_eq!(CpuSerial::new(device.clone()).acc_props().block_threads_max, 1);
//! assert_eq!(CpuBlocks::new(device.clone()).name(), "cpu_blocks");
//! assert!(CpuThreads::new(device.clone()).acc_props().block_threads_max > 1);
//! assert!(CpuFibers::new(device).acc_props().block_threads_max > 1);
//! ```

mod blocks;
mod fibers;
mod serial;
mod threads;

pub use blocks::CpuBlocks;
pub use fibers::CpuFibers;
pub use serial::CpuSerial;
pub use threads::CpuThreads;

use crate::device::{CpuDevice, Device};
use crate::workdiv::AccProps;

/// Limits of a host backend running `block_threads_max` lanes per block
fn host_acc_props(device: &CpuDevice, block_threads_max: usize) -> AccProps {
    let props = device.props();
    AccProps {
        grid_block_extent_max: props.grid_block_extent_max,
        block_thread_extent_max: block_threads_max,
        block_threads_max,
        thread_elem_extent_max: usize::MAX,
        shared_mem_bytes_max: props.shared_mem_bytes_max,
        warp_size: props.warp_size,
    }
}
