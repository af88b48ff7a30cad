//! Raw zeroed allocations and ledger-backed device allocations

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::device::Device;
use crate::error::AllocationError;

/// Alignment of every buffer and shared-memory region
pub(crate) const BASE_ALIGN: usize = 64;

/// Zero-initialized heap block, freed on drop
pub(crate) struct RawAllocation {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the allocation is plain bytes owned by this value; synchronizing
// access to its contents is the responsibility of the views built on it.
unsafe impl Send for RawAllocation {}
unsafe impl Sync for RawAllocation {}

impl RawAllocation {
    /// Allocate `size` zeroed bytes aligned to `BASE_ALIGN`.
    ///
    /// Zero sizes allocate one byte so the pointer is always valid.
    pub(crate) fn zeroed(size: usize) -> Result<Self, AllocationError> {
        let layout = Layout::from_size_align(size.max(1), BASE_ALIGN)
            .map_err(|err| AllocationError::LayoutOverflow(format!("{size} bytes: {err}")))?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| AllocationError::OutOfMemory {
            device: "host allocator".to_string(),
            requested: size,
            available: 0,
        })?;

        Ok(Self { ptr, layout })
    }

    pub(crate) fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(crate) fn size(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for RawAllocation {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by alloc_zeroed with this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Memory reserved on a device's ledger.
///
/// The ledger entry is released exactly once, when this value drops. Moving
/// the value moves the ownership; the moved-from binding owns nothing.
pub(crate) struct DeviceAllocation<D: Device> {
    raw: RawAllocation,
    device: D,
    bytes: usize,
}

impl<D: Device> DeviceAllocation<D> {
    pub(crate) fn new(device: &D, bytes: usize) -> Result<Self, AllocationError> {
        device.memory().reserve(bytes)?;
        match RawAllocation::zeroed(bytes) {
            Ok(raw) => Ok(Self {
                raw,
                device: device.clone(),
                bytes,
            }),
            Err(err) => {
                device.memory().release(bytes);
                Err(err)
            }
        }
    }

    pub(crate) fn as_ptr(&self) -> NonNull<u8> {
        self.raw.as_ptr()
    }

    pub(crate) fn device(&self) -> &D {
        &self.device
    }

    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }
}

impl<D: Device> Drop for DeviceAllocation<D> {
    fn drop(&mut self) {
        self.device.memory().release(self.bytes);
        tracing::trace!(device = %self.device.id(), bytes = self.bytes, "device_allocation_released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CpuDevice;

    #[test]
    fn test_raw_allocation_is_zeroed_and_aligned() {
        let raw = RawAllocation::zeroed(256).unwrap();
        assert_eq!(raw.as_ptr().as_ptr() as usize % BASE_ALIGN, 0);
        // SAFETY: 256 bytes were just allocated and zeroed.
        let bytes = unsafe { std::slice::from_raw_parts(raw.as_ptr().as_ptr(), 256) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_size_allocation() {
        let raw = RawAllocation::zeroed(0).unwrap();
        assert_eq!(raw.size(), 1);
    }

    #[test]
    fn test_device_allocation_releases_once() {
        let device = CpuDevice::new();
        let alloc = DeviceAllocation::new(&device, 1024).unwrap();
        assert_eq!(device.memory().used_bytes(), 1024);
        let moved = alloc;
        assert_eq!(device.memory().live_allocations(), 1);
        drop(moved);
        assert_eq!(device.memory().used_bytes(), 0);
        assert_eq!(device.memory().live_allocations(), 0);
    }
}
