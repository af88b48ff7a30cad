//! Shared memory provided by the device for each resident block
//!
//! Every lane keeps its own allocation cursor over the block's slot. Lanes
//! that allocate in the same order compute the same offsets, so no barrier
//! is needed to agree on them.

use std::cell::Cell;
use std::fmt;
use std::future::{self, Future};

use polyacc_core::Element;

use super::arena::{reserve_local, SharedRegion};
use super::{SharedAlloc, SharedSlice};
use crate::error::Result;

/// One lane's view of its block's device-provided shared slot
pub struct BuiltInSharedAlloc<'b> {
    region: &'b SharedRegion,
    top: Cell<usize>,
}

impl<'b> BuiltInSharedAlloc<'b> {
    pub(crate) fn new(region: &'b SharedRegion) -> Self {
        Self {
            region,
            top: Cell::new(0),
        }
    }
}

impl SharedAlloc for BuiltInSharedAlloc<'_> {
    fn alloc<T: Element>(&self, len: usize) -> impl Future<Output = Result<SharedSlice<'_, T>>> {
        future::ready(reserve_local(self.region, &self.top, len).map_err(Into::into))
    }

    fn reserved_bytes(&self) -> usize {
        self.top.get()
    }

    fn dyn_shared<T: Element>(&self) -> SharedSlice<'_, T> {
        self.region.dyn_slice()
    }
}

impl fmt::Debug for BuiltInSharedAlloc<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltInSharedAlloc")
            .field("capacity", &self.region.capacity())
            .field("reserved", &self.top.get())
            .finish()
    }
}
