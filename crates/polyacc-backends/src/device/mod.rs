//! Devices and device managers
//!
//! A device owns a memory ledger and a set of properties. Two device families
//! exist:
//!
//! ```text
//! Platform ──► Device ──► DeviceMemory (ledger: used / live / capacity)
//!    │            │
//!    │            └── DeviceProps (name, limits, pitch alignment)
//!    │
//!    ├── CpuPlatform    : one host device, host-dereferenceable memory
//!    └── SimGpuPlatform : N simulated accelerators, memory reachable only
//!                         through explicit copies and kernel accessors
//! ```

mod cpu;
mod memory;
mod platform;
mod sim_gpu;

pub use cpu::{CpuDevice, CpuPlatform};
pub use memory::DeviceMemory;
pub use platform::Platform;
pub use sim_gpu::{SimGpuDevice, SimGpuPlatform};

use std::fmt;

/// Device family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Host CPU; memory is directly dereferenceable
    Host,
    /// Simulated accelerator with its own memory space
    SimGpu,
}

impl DeviceKind {
    /// Short name used in device ids
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Host => "cpu",
            Self::SimGpu => "simgpu",
        }
    }
}

/// Identity of a device on its platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub kind: DeviceKind,
    pub index: usize,
}

impl DeviceId {
    pub const fn new(kind: DeviceKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.index)
    }
}

/// Static properties of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProps {
    pub name: String,
    pub kind: DeviceKind,
    /// Blocks that can execute concurrently
    pub multiprocessor_count: usize,
    /// Global memory capacity; `usize::MAX` when unlimited
    pub global_mem_bytes: usize,
    /// Block-shared memory per block
    pub shared_mem_bytes_max: usize,
    /// Threads per block the hardware supports
    pub block_threads_max: usize,
    /// Blocks per grid axis
    pub grid_block_extent_max: usize,
    /// Row pitch alignment of pitched allocations in bytes
    pub pitch_alignment: usize,
    /// Lanes that vote together in warp operations
    pub warp_size: usize,
}

/// A device that can own buffers.
///
/// Devices are cheap handles: clones refer to the same device and ledger.
pub trait Device: Clone + fmt::Debug + Send + Sync + 'static {
    /// Platform identity
    fn id(&self) -> DeviceId;

    /// Static properties
    fn props(&self) -> &DeviceProps;

    /// Memory ledger
    fn memory(&self) -> &DeviceMemory;

    /// Whether two handles refer to the same device
    fn same_device(&self, other: &Self) -> bool;
}

/// Device whose memory the host may dereference directly
pub trait HostAccessible: Device {}
