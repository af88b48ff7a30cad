//! Host CPU device

use std::fmt;
use std::sync::Arc;

use super::{Device, DeviceId, DeviceKind, DeviceMemory, DeviceProps, HostAccessible, Platform};
use crate::config::HostConfig;
use crate::error::AllocationError;

struct CpuDeviceInner {
    props: DeviceProps,
    memory: DeviceMemory,
}

/// The host CPU as a device.
///
/// Each `CpuDevice::new` creates an independent ledger; clones share it.
#[derive(Clone)]
pub struct CpuDevice {
    inner: Arc<CpuDeviceInner>,
}

impl CpuDevice {
    /// Host device with default limits
    pub fn new() -> Self {
        Self::with_config(&HostConfig::default())
    }

    /// Host device with the given limits
    pub fn with_config(config: &HostConfig) -> Self {
        let id = DeviceId::new(DeviceKind::Host, 0);
        let capacity = config.memory_limit_bytes.unwrap_or(usize::MAX);
        let props = DeviceProps {
            name: "host cpu".to_string(),
            kind: DeviceKind::Host,
            multiprocessor_count: std::thread::available_parallelism().map_or(1, |n| n.get()),
            global_mem_bytes: capacity,
            shared_mem_bytes_max: config.shared_mem_bytes_max,
            block_threads_max: config.block_threads_max.max(config.fiber_block_threads_max),
            grid_block_extent_max: usize::MAX,
            pitch_alignment: 1,
            warp_size: 1,
        };

        tracing::debug!(device = %id, capacity, "host_device_created");

        Self {
            inner: Arc::new(CpuDeviceInner {
                props,
                memory: DeviceMemory::new(id, capacity),
            }),
        }
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuDevice")
            .field("id", &self.id())
            .field("used_bytes", &self.inner.memory.used_bytes())
            .finish()
    }
}

impl Device for CpuDevice {
    fn id(&self) -> DeviceId {
        DeviceId::new(DeviceKind::Host, 0)
    }

    fn props(&self) -> &DeviceProps {
        &self.inner.props
    }

    fn memory(&self) -> &DeviceMemory {
        &self.inner.memory
    }

    fn same_device(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl HostAccessible for CpuDevice {}

/// Platform with exactly one host device
#[derive(Debug, Clone, Default)]
pub struct CpuPlatform {
    device: CpuDevice,
}

impl CpuPlatform {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            device: CpuDevice::with_config(config),
        }
    }
}

impl Platform for CpuPlatform {
    type Device = CpuDevice;

    fn device_count(&self) -> usize {
        1
    }

    fn device_by_index(&self, index: usize) -> Result<CpuDevice, AllocationError> {
        if index == 0 {
            Ok(self.device.clone())
        } else {
            Err(AllocationError::InvalidDevice { index, count: 1 })
        }
    }
}
