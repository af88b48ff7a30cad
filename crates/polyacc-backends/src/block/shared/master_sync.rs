//! Shared memory reserved by the block's master lane
//!
//! ```text
//! all lanes:  sync ──► master reserves, publishes offset ──► sync ──► read offset
//! ```
//!
//! The leading barrier keeps the master from overwriting the published
//! offset while another lane still reads the previous one.

use std::fmt;
use std::future::Future;

use parking_lot::Mutex;
use polyacc_core::Element;

use super::arena::{bump, SharedRegion};
use super::{SharedAlloc, SharedSlice};
use crate::block::sync::BlockSync;
use crate::error::{BackendError, CapacityError, Result};

/// Arena shared by all lanes of a block; the master lane reserves
pub struct MasterSyncSharedAlloc<'b, S, F = fn() -> bool> {
    region: &'b SharedRegion,
    sync: &'b S,
    is_master: F,
    top: Mutex<usize>,
    published: Mutex<Option<std::result::Result<usize, CapacityError>>>,
}

impl<'b, S: BlockSync, F: Fn() -> bool> MasterSyncSharedAlloc<'b, S, F> {
    pub(crate) fn new(region: &'b SharedRegion, sync: &'b S, is_master: F) -> Self {
        Self {
            region,
            sync,
            is_master,
            top: Mutex::new(0),
            published: Mutex::new(None),
        }
    }

    fn publish<T: Element>(&self, len: usize) {
        let mut top = self.top.lock();
        let outcome = bump::<T>(*top, len, self.region.capacity()).map(|(offset, new_top)| {
            *top = new_top;
            offset
        });
        tracing::trace!(len, elem = %T::KIND, outcome = ?outcome, "master_shared_alloc");
        *self.published.lock() = Some(outcome);
    }
}

impl<S: BlockSync, F: Fn() -> bool> SharedAlloc for MasterSyncSharedAlloc<'_, S, F> {
    fn alloc<T: Element>(&self, len: usize) -> impl Future<Output = Result<SharedSlice<'_, T>>> {
        async move {
            self.sync.sync().await;
            if (self.is_master)() {
                self.publish::<T>(len);
            }
            self.sync.sync().await;

            let outcome = self
                .published
                .lock()
                .clone()
                .ok_or_else(|| BackendError::execution_error("block shared allocation without a master lane"))?;
            let offset = outcome?;
            // SAFETY: the master reserved [offset, offset + len * size) for T.
            Ok(unsafe { SharedSlice::new(self.region.base(), offset, len) })
        }
    }

    fn reserved_bytes(&self) -> usize {
        *self.top.lock()
    }

    fn dyn_shared<T: Element>(&self) -> SharedSlice<'_, T> {
        self.region.dyn_slice()
    }
}

impl<S, F> fmt::Debug for MasterSyncSharedAlloc<'_, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSyncSharedAlloc")
            .field("capacity", &self.region.capacity())
            .field("reserved", &*self.top.lock())
            .finish()
    }
}
