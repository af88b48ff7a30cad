//! Device manager trait

use super::Device;
use crate::error::AllocationError;

/// Enumerates the devices of one family.
pub trait Platform {
    type Device: Device;

    /// Number of devices on this platform
    fn device_count(&self) -> usize;

    /// Device at `index`; `AllocationError::InvalidDevice` outside `[0, device_count)`
    fn device_by_index(&self, index: usize) -> Result<Self::Device, AllocationError>;

    /// All devices in index order
    fn devices(&self) -> Vec<Self::Device> {
        (0..self.device_count())
            .filter_map(|index| self.device_by_index(index).ok())
            .collect()
    }
}
