//! Simulated accelerator devices
//!
//! A simulated accelerator has its own bounded global memory, a per-block
//! shared memory limit and a pitched allocation alignment, like a discrete
//! GPU. Its memory lives in host RAM but is not
//! [`HostAccessible`](super::HostAccessible): the host
//! reaches it only through explicit copies, kernels only through accessors.

use std::fmt;
use std::sync::Arc;

use super::{Device, DeviceId, DeviceKind, DeviceMemory, DeviceProps, Platform};
use crate::config::SimGpuConfig;
use crate::error::AllocationError;

struct SimGpuInner {
    id: DeviceId,
    props: DeviceProps,
    memory: DeviceMemory,
}

/// One simulated accelerator
#[derive(Clone)]
pub struct SimGpuDevice {
    inner: Arc<SimGpuInner>,
}

impl SimGpuDevice {
    /// Device `index` shaped by `config`
    pub fn new(index: usize, config: &SimGpuConfig) -> Self {
        let id = DeviceId::new(DeviceKind::SimGpu, index);
        let props = DeviceProps {
            name: config.name.clone(),
            kind: DeviceKind::SimGpu,
            multiprocessor_count: config.multiprocessor_count,
            global_mem_bytes: config.global_mem_bytes,
            shared_mem_bytes_max: config.shared_mem_bytes_max,
            block_threads_max: config.block_threads_max,
            grid_block_extent_max: config.grid_block_extent_max,
            pitch_alignment: config.pitch_alignment,
            warp_size: config.warp_size,
        };

        tracing::debug!(
            device = %id,
            global_mem_bytes = config.global_mem_bytes,
            shared_mem_bytes_max = config.shared_mem_bytes_max,
            "sim_gpu_device_created"
        );

        Self {
            inner: Arc::new(SimGpuInner {
                id,
                props,
                memory: DeviceMemory::new(id, config.global_mem_bytes),
            }),
        }
    }
}

impl Default for SimGpuDevice {
    fn default() -> Self {
        Self::new(0, &SimGpuConfig::default())
    }
}

impl fmt::Debug for SimGpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimGpuDevice")
            .field("id", &self.inner.id)
            .field("used_bytes", &self.inner.memory.used_bytes())
            .finish()
    }
}

impl Device for SimGpuDevice {
    fn id(&self) -> DeviceId {
        self.inner.id
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

/// Device manager for simulated accelerators
#[derive(Debug, Clone)]
pub struct SimGpuPlatform {
    devices: Vec<SimGpuDevice>,
}

impl SimGpuPlatform {
    pub fn new(config: &SimGpuConfig) -> Self {
        Self {
            devices: (0..config.device_count)
                .map(|index| SimGpuDevice::new(index, config))
                .collect(),
        }
    }
}

impl Default for SimGpuPlatform {
    fn default() -> Self {
        Self::new(&SimGpuConfig::default())
    }
}

impl Platform for SimGpuPlatform {
    type Device = SimGpuDevice;

    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn device_by_index(&self, index: usize) -> Result<SimGpuDevice, AllocationError> {
        self.devices
            .get(index)
            .cloned()
            .ok_or(AllocationError::InvalidDevice {
                index,
                count: self.devices.len(),
            })
    }
}
