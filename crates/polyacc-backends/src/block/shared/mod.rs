//! Block-shared memory
//!
//! Each block owns an arena sized by the kernel's declared shared bytes.
//! Lanes reserve typed slices from it in program order; every lane that
//! performs the same sequence of allocations receives the same slices.
//!
//! | allocator                 | lanes per block | arena owner              |
//! |---------------------------|-----------------|--------------------------|
//! | [`NoSyncSharedAlloc`]     | 1               | the allocator            |
//! | [`MasterSyncSharedAlloc`] | many            | the block, master writes |
//! | [`BuiltInSharedAlloc`]    | many            | the device block slot    |
//!
//! Requests beyond the arena fail with
//! [`CapacityError::SharedMemoryExceeded`](crate::error::CapacityError).
//!
//! Besides the arena, a block may carry a dynamic area sized at launch by
//! [`Kernel::dyn_shared_mem_bytes`](crate::Kernel::dyn_shared_mem_bytes).
//! It is not reserved piecewise: every lane receives the whole area, typed
//! as it asks, through [`SharedAlloc::dyn_shared`].

mod arena;
mod built_in;
mod master_sync;
mod no_sync;

pub(crate) use arena::SharedRegion;
pub use built_in::BuiltInSharedAlloc;
pub use master_sync::MasterSyncSharedAlloc;
pub use no_sync::NoSyncSharedAlloc;

use std::cell::UnsafeCell;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::ops::Range;
use std::ptr::NonNull;

use polyacc_core::Element;

use crate::atomic::{AtomicElement, AtomicOp};
use crate::error::Result;

/// Allocates block-shared slices
pub trait SharedAlloc {
    /// Reserve `len` zero-initialized elements visible to the whole block
    fn alloc<T: Element>(&self, len: usize) -> impl Future<Output = Result<SharedSlice<'_, T>>>;

    /// Bytes reserved so far in this block, alignment padding included
    fn reserved_bytes(&self) -> usize;

    /// The block's dynamic area as a slice of `T`; empty when the kernel
    /// declared no dynamic bytes
    fn dyn_shared<T: Element>(&self) -> SharedSlice<'_, T>;
}

impl<S: SharedAlloc + ?Sized> SharedAlloc for &S {
    fn alloc<T: Element>(&self, len: usize) -> impl Future<Output = Result<SharedSlice<'_, T>>> {
        (**self).alloc(len)
    }

    fn reserved_bytes(&self) -> usize {
        (**self).reserved_bytes()
    }

    fn dyn_shared<T: Element>(&self) -> SharedSlice<'_, T> {
        (**self).dyn_shared()
    }
}

/// Typed slice of block-shared memory.
///
/// Copies refer to the same memory. Plain loads and stores are `unsafe`
/// because lanes share the slice; order them with block barriers.
pub struct SharedSlice<'b, T> {
    ptr: NonNull<T>,
    len: usize,
    offset: usize,
    _marker: PhantomData<&'b UnsafeCell<[T]>>,
}

impl<T> Clone for SharedSlice<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SharedSlice<'_, T> {}

// SAFETY: concurrent non-atomic access is covered by the unsafe contracts.
unsafe impl<T: Send> Send for SharedSlice<'_, T> {}
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}

impl<'b, T: Element> SharedSlice<'b, T> {
    /// # Safety
    ///
    /// `base + offset` must be valid for `len` elements of `T`, aligned, for `'b`.
    pub(crate) unsafe fn new(base: NonNull<u8>, offset: usize, len: usize) -> Self {
        Self {
            // SAFETY: offset lies inside the region.
            ptr: unsafe { base.add(offset) }.cast(),
            len,
            offset,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes of the block arena this slice covers
    pub fn byte_range(&self) -> Range<usize> {
        self.offset..self.offset + self.len * std::mem::size_of::<T>()
    }

    fn element_ptr(&self, index: usize) -> *mut T {
        assert!(index < self.len, "shared index {index} out of bounds for length {}", self.len);
        // SAFETY: index is in bounds.
        unsafe { self.ptr.as_ptr().add(index) }
    }

    /// Element at `index`; panics when out of bounds.
    ///
    /// # Safety
    ///
    /// No other lane may write the element concurrently.
    pub unsafe fn load(&self, index: usize) -> T {
        // SAFETY: forwarded from the caller.
        unsafe { self.element_ptr(index).read() }
    }

    /// Store `value` at `index`; panics when out of bounds.
    ///
    /// # Safety
    ///
    /// No other lane may access the element concurrently.
    pub unsafe fn store(&self, index: usize, value: T) {
        // SAFETY: forwarded from the caller.
        unsafe { self.element_ptr(index).write(value) }
    }
}

impl<'b, T: AtomicElement> SharedSlice<'b, T> {
    /// Atomically apply `op` at `index` and return the previous value
    pub fn atomic(&self, index: usize, op: AtomicOp, operand: T) -> T {
        // SAFETY: in bounds and aligned to the element size.
        unsafe { T::atomic_rmw(self.element_ptr(index), op, operand) }
    }

    /// Atomic compare-and-swap at `index`; returns the previous value
    pub fn atomic_cas(&self, index: usize, current: T, new: T) -> T {
        // SAFETY: as in `atomic`.
        unsafe { T::atomic_cas(self.element_ptr(index), current, new) }
    }
}

impl<T> fmt::Debug for SharedSlice<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSlice")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}
