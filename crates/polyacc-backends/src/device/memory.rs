//! Per-device memory ledger

use std::sync::atomic::{AtomicUsize, Ordering};

use super::DeviceId;
use crate::error::AllocationError;

/// Tracks the bytes and allocations live on one device.
///
/// Every owning buffer reserves its size here before allocating and releases
/// it exactly once when dropped, so `used_bytes() == 0` and
/// `live_allocations() == 0` after all buffers of a device are gone.
#[derive(Debug)]
pub struct DeviceMemory {
    device: DeviceId,
    capacity: usize,
    used: AtomicUsize,
    live: AtomicUsize,
}

impl DeviceMemory {
    pub(crate) fn new(device: DeviceId, capacity: usize) -> Self {
        Self {
            device,
            capacity,
            used: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    /// Total capacity in bytes
    pub fn capacity_bytes(&self) -> usize {
        self.capacity
    }

    /// Bytes currently reserved
    pub fn used_bytes(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Bytes still available
    pub fn available_bytes(&self) -> usize {
        self.capacity.saturating_sub(self.used_bytes())
    }

    /// Number of live allocations
    pub fn live_allocations(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn reserve(&self, bytes: usize) -> Result<(), AllocationError> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= self.capacity)
            })
            .map_err(|used| AllocationError::OutOfMemory {
                device: self.device.to_string(),
                requested: bytes,
                available: self.capacity.saturating_sub(used),
            })?;
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub(crate) fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;

    fn ledger(capacity: usize) -> DeviceMemory {
        DeviceMemory::new(DeviceId::new(DeviceKind::SimGpu, 0), capacity)
    }

    #[test]
    fn test_reserve_and_release() {
        let memory = ledger(1024);
        memory.reserve(512).unwrap();
        memory.reserve(256).unwrap();
        assert_eq!(memory.used_bytes(), 768);
        assert_eq!(memory.live_allocations(), 2);
        assert_eq!(memory.available_bytes(), 256);

        memory.release(512);
        memory.release(256);
        assert_eq!(memory.used_bytes(), 0);
        assert_eq!(memory.live_allocations(), 0);
    }

    #[test]
    fn test_out_of_memory() {
        let memory = ledger(100);
        memory.reserve(60).unwrap();
        let err = memory.reserve(50).unwrap_err();
        assert_eq!(
            err,
            AllocationError::OutOfMemory {
                device: "simgpu0".to_string(),
                requested: 50,
                available: 40
            }
        );
        assert_eq!(memory.used_bytes(), 60);
        assert_eq!(memory.live_allocations(), 1);
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_capacity() {
        let memory = ledger(1000);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        let _ = memory.reserve(7);
                    }
                });
            }
        });
        assert!(memory.used_bytes() <= 1000);
        assert_eq!(memory.used_bytes(), memory.live_allocations() * 7);
    }
}
