//! Shared memory for single-lane blocks

use std::cell::Cell;
use std::fmt;
use std::future::{self, Future};

use polyacc_core::Element;

use super::arena::{reserve_local, SharedRegion};
use super::{SharedAlloc, SharedSlice};
use crate::error::{AllocationError, Result};

/// Arena owned by a block whose only lane allocates without synchronizing
pub struct NoSyncSharedAlloc {
    region: SharedRegion,
    top: Cell<usize>,
}

impl NoSyncSharedAlloc {
    pub(crate) fn new(capacity: usize) -> std::result::Result<Self, AllocationError> {
        Ok(Self::from_region(SharedRegion::new(capacity)?))
    }

    pub(crate) fn from_region(region: SharedRegion) -> Self {
        Self {
            region,
            top: Cell::new(0),
        }
    }

    /// Arena size in bytes
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }
}

impl SharedAlloc for NoSyncSharedAlloc {
    fn alloc<T: Element>(&self, len: usize) -> impl Future<Output = Result<SharedSlice<'_, T>>> {
        future::ready(reserve_local(&self.region, &self.top, len).map_err(Into::into))
    }

    fn reserved_bytes(&self) -> usize {
        self.top.get()
    }

    fn dyn_shared<T: Element>(&self) -> SharedSlice<'_, T> {
        self.region.dyn_slice()
    }
}

impl fmt::Debug for NoSyncSharedAlloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoSyncSharedAlloc")
            .field("capacity", &self.region.capacity())
            .field("reserved", &self.top.get())
            .finish()
    }
}
