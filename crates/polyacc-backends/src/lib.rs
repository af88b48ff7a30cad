//! Devices, buffers and kernel launch backends for polyacc
//!
//! This crate provides:
//! - **Devices**: host and simulated accelerators with memory ledgers
//! - **Buffers and views**: pitched N-dimensional memory and explicit copies
//! - **Block facilities**: barriers, block-shared memory, lane identity
//! - **Backends**: five ways to run one kernel over a grid
//! - **Queues and events**: in-order task submission, blocking or on a worker thread
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Kernel<N>  (async fn run)                │
//! │        indices, barriers, shared memory via Acc<N>       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │  Backend::launch(&WorkDiv<N>, &kernel)
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │     Launch: validate WorkDiv + shared bytes up front     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!    ┌──────────┬───────┴──┬────────────┬─────────────┐
//!    ▼          ▼          ▼            ▼             ▼
//! ┌────────┐ ┌────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐
//! │ Serial │ │ Blocks │ │ Threads │ │ Fibers  │ │  SimGpu  │
//! │ 1 lane │ │ rayon  │ │ OS/lane │ │ futures │ │ SM pool  │
//! └────────┘ └────────┘ └─────────┘ └─────────┘ └──────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use polyacc_backends::{Acc, Backend, Buffer, CpuDevice, CpuThreads, Kernel, Result, WorkDiv};
//! use polyacc_backends::mem::Accessor;
//!
//! struct Square<'a> {
//!     data: Accessor<'a, u32, 1>,
//! }
//!
//! impl Kernel<1> for Square<'_> {
//!     async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
//!         let i = acc.grid_thread_linear_idx();
//!         // SAFETY: each lane owns element `i`.
//!         unsafe { self.data.set([i], self.data.get([i]).pow(2)) };
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let device = CpuDevice::new();
//! let backend = CpuThreads::new(device.clone());
//! let mut data = Buffer::<u32, _, 1>::allocate(&device, [8])?;
//! data.copy_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7])?;
//!
//! let work_div = WorkDiv::linear(2, 4, 1)?;
//! backend.launch(&work_div, &Square { data: data.accessor_mut() })?;
//! assert_eq!(data.to_vec(), vec![0, 1, 4, 9, 16, 25, 36, 49]);
//! # Ok(())
//! # }
//! ```

pub mod acc;
pub mod atomic;
pub mod backend;
pub mod backends;
pub mod block;
pub mod config;
pub mod device;
pub mod error;
pub mod mem;
pub mod queue;
pub mod workdiv;

pub use polyacc_core;

pub use acc::{Acc, LaneAcc};
pub use atomic::{AtomicElement, AtomicOp};
pub use backend::{Backend, Kernel};
pub use backends::{CpuBlocks, CpuFibers, CpuSerial, CpuThreads, SimGpu};
pub use block::{
    current_lane, is_master_lane, BlockPredicate, BlockReduce, BlockSync, BuiltInSharedAlloc, FiberBarrier,
    MasterSyncSharedAlloc, NoOpSync, NoSyncSharedAlloc, SharedAlloc, SharedSlice, ThreadBarrier,
};
pub use config::{BackendConfig, HostConfig, SimGpuConfig};
pub use device::{
    CpuDevice, CpuPlatform, Device, DeviceId, DeviceKind, DeviceMemory, DeviceProps, HostAccessible, Platform,
    SimGpuDevice, SimGpuPlatform,
};
pub use error::{AllocationError, BackendError, CapacityError, ConfigError, Result};
pub use mem::{copy, Accessor, Buffer, ConstView, MemRead, MemWrite, PitchedLayout, ReadAccessor, View};
pub use queue::{BlockingQueue, Event, NonBlockingQueue, Queue};
pub use workdiv::{AccProps, WorkDiv};
