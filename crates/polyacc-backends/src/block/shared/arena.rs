//! Per-block shared-memory arena and bump reservation
//!
//! ```text
//! 0                  capacity   dyn_offset (64-aligned)     dyn_offset + dyn_bytes
//! ├─ static arena ──────┤ pad ─┼─ dynamic area ───────────────┤
//!   bump-reserved slices         one slice, same for every lane
//! ```

use std::cell::Cell;
use std::ptr::NonNull;

use polyacc_core::Element;

use super::SharedSlice;
use crate::error::{AllocationError, CapacityError};
use crate::mem::raw::{RawAllocation, BASE_ALIGN};

/// Zeroed bytes backing one block's shared memory
pub(crate) struct SharedRegion {
    raw: RawAllocation,
    capacity: usize,
    dyn_offset: usize,
    dyn_bytes: usize,
}

impl SharedRegion {
    /// Region with a static arena of `capacity` bytes and no dynamic area
    pub(crate) fn new(capacity: usize) -> Result<Self, AllocationError> {
        Self::with_dynamic(capacity, 0)
    }

    /// Region with a static arena of `capacity` bytes followed by a
    /// dynamic area of `dyn_bytes`
    pub(crate) fn with_dynamic(capacity: usize, dyn_bytes: usize) -> Result<Self, AllocationError> {
        let overflow = || AllocationError::LayoutOverflow(format!("{capacity} + {dyn_bytes} shared bytes"));
        let dyn_offset = if dyn_bytes == 0 {
            capacity
        } else {
            capacity.checked_next_multiple_of(BASE_ALIGN).ok_or_else(overflow)?
        };
        let total = dyn_offset.checked_add(dyn_bytes).ok_or_else(overflow)?;
        Ok(Self {
            raw: RawAllocation::zeroed(total)?,
            capacity,
            dyn_offset,
            dyn_bytes,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn base(&self) -> NonNull<u8> {
        self.raw.as_ptr()
    }

    /// The dynamic area as `dyn_bytes / size_of::<T>()` elements
    pub(crate) fn dyn_slice<T: Element>(&self) -> SharedSlice<'_, T> {
        let len = self.dyn_bytes / std::mem::size_of::<T>();
        // SAFETY: dyn_offset is BASE_ALIGN-aligned (or the area is empty) and
        // [dyn_offset, dyn_offset + dyn_bytes) lies inside the allocation.
        unsafe { SharedSlice::new(self.base(), self.dyn_offset, len) }
    }
}

/// Alignment of a shared slice of `T`: the element size, so atomics work
pub(crate) fn slice_align<T>() -> usize {
    std::mem::size_of::<T>()
        .next_power_of_two()
        .max(std::mem::align_of::<T>())
}

/// Reserve `len` elements of `T` above `top`; returns the offset and new top
pub(crate) fn bump<T>(top: usize, len: usize, capacity: usize) -> Result<(usize, usize), CapacityError> {
    let exceeded = |requested| CapacityError::SharedMemoryExceeded {
        requested,
        limit: capacity,
    };

    let offset = top
        .checked_next_multiple_of(slice_align::<T>())
        .ok_or(exceeded(usize::MAX))?;
    let end = len
        .checked_mul(std::mem::size_of::<T>())
        .and_then(|bytes| offset.checked_add(bytes))
        .ok_or(exceeded(usize::MAX))?;

    if end > capacity {
        return Err(exceeded(end));
    }
    Ok((offset, end))
}

/// Bump-reserve a slice from `region` using a lane-local `top`
pub(crate) fn reserve_local<'b, T: Element>(
    region: &'b SharedRegion,
    top: &Cell<usize>,
    len: usize,
) -> Result<SharedSlice<'b, T>, CapacityError> {
    let (offset, new_top) = bump::<T>(top.get(), len, region.capacity())?;
    top.set(new_top);
    tracing::trace!(offset, len, elem = %T::KIND, "shared_alloc");
    // SAFETY: bump kept [offset, new_top) inside the region and aligned it for T.
    Ok(unsafe { SharedSlice::new(region.base(), offset, len) })
}
