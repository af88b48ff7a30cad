//! Element accessors handed to kernels
//!
//! [`ReadAccessor`] is built from a shared borrow and only reads, so its
//! reads are safe. [`Accessor`] is built from an exclusive borrow and is
//! `Copy`, so every lane of a launch can hold one; plain reads and writes
//! through it are `unsafe` because lanes may alias the same element. Atomics
//! are always safe.
//!
//! All element access is bounds-checked against the extent.

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use polyacc_core::{Element, Vector};

use super::layout::PitchedLayout;
use crate::atomic::{AtomicElement, AtomicOp};
use crate::error::Result;

/// Read-only element access
pub struct ReadAccessor<'a, T, const N: usize> {
    base: NonNull<u8>,
    layout: PitchedLayout<N>,
    _marker: PhantomData<&'a [T]>,
}

impl<T, const N: usize> Clone for ReadAccessor<'_, T, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const N: usize> Copy for ReadAccessor<'_, T, N> {}

// SAFETY: a ReadAccessor behaves like `&[T]`.
unsafe impl<T: Sync, const N: usize> Send for ReadAccessor<'_, T, N> {}
unsafe impl<T: Sync, const N: usize> Sync for ReadAccessor<'_, T, N> {}

impl<'a, T: Element, const N: usize> ReadAccessor<'a, T, N> {
    /// # Safety
    ///
    /// `base` must point to memory described by `layout`, valid for reads
    /// and not written through any other path during `'a`.
    pub(crate) unsafe fn new(base: NonNull<u8>, layout: PitchedLayout<N>) -> Self {
        Self {
            base,
            layout,
            _marker: PhantomData,
        }
    }

    pub fn extent(&self) -> Vector<usize, N> {
        self.layout.extent()
    }

    /// Element at `index`; panics when out of bounds
    pub fn get(&self, index: impl Into<Vector<usize, N>>) -> T {
        let index = index.into();
        match self.try_get(index) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Element at `index`, or `IndexOutOfBounds`
    pub fn try_get(&self, index: impl Into<Vector<usize, N>>) -> Result<T> {
        let offset = self.layout.checked_byte_offset(&index.into())?;
        // SAFETY: in bounds; the memory is immutable for 'a.
        Ok(unsafe { self.base.as_ptr().add(offset).cast::<T>().read_unaligned() })
    }
}

impl<T, const N: usize> fmt::Debug for ReadAccessor<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadAccessor")
            .field("extent", &self.layout.extent())
            .field("pitch_bytes", &self.layout.pitch_bytes())
            .finish()
    }
}

/// Shared read-write element access for kernels
pub struct Accessor<'a, T, const N: usize> {
    base: NonNull<u8>,
    layout: PitchedLayout<N>,
    _marker: PhantomData<&'a UnsafeCell<[T]>>,
}

impl<T, const N: usize> Clone for Accessor<'_, T, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const N: usize> Copy for Accessor<'_, T, N> {}

// SAFETY: the accessor was created from an exclusive borrow; concurrent
// non-atomic access is guarded by the `unsafe` methods' contracts.
unsafe impl<T: Send, const N: usize> Send for Accessor<'_, T, N> {}
unsafe impl<T: Send, const N: usize> Sync for Accessor<'_, T, N> {}

impl<'a, T: Element, const N: usize> Accessor<'a, T, N> {
    /// # Safety
    ///
    /// `base` must point to memory described by `layout`, valid for reads
    /// and writes and reached through no other path during `'a`.
    pub(crate) unsafe fn new(base: NonNull<u8>, layout: PitchedLayout<N>) -> Self {
        Self {
            base,
            layout,
            _marker: PhantomData,
        }
    }

    pub fn extent(&self) -> Vector<usize, N> {
        self.layout.extent()
    }

    fn element_ptr(&self, index: Vector<usize, N>) -> Result<*mut T> {
        let offset = self.layout.checked_byte_offset(&index)?;
        // SAFETY: offset is within the allocation.
        Ok(unsafe { self.base.as_ptr().add(offset).cast::<T>() })
    }

    fn element_ptr_or_panic(&self, index: Vector<usize, N>) -> *mut T {
        match self.element_ptr(index) {
            Ok(ptr) => ptr,
            Err(err) => panic!("{err}"),
        }
    }

    /// Element at `index`; panics when out of bounds.
    ///
    /// # Safety
    ///
    /// No other lane may write the element concurrently.
    pub unsafe fn get(&self, index: impl Into<Vector<usize, N>>) -> T {
        // SAFETY: forwarded from the caller.
        unsafe { self.element_ptr_or_panic(index.into()).read_unaligned() }
    }

    /// Store `value` at `index`; panics when out of bounds.
    ///
    /// # Safety
    ///
    /// No other lane may read or write the element concurrently.
    pub unsafe fn set(&self, index: impl Into<Vector<usize, N>>, value: T) {
        // SAFETY: forwarded from the caller.
        unsafe { self.element_ptr_or_panic(index.into()).write_unaligned(value) }
    }

    /// Like [`Accessor::get`] with `IndexOutOfBounds` instead of a panic.
    ///
    /// # Safety
    ///
    /// Same contract as [`Accessor::get`].
    pub unsafe fn try_get(&self, index: impl Into<Vector<usize, N>>) -> Result<T> {
        let ptr = self.element_ptr(index.into())?;
        // SAFETY: forwarded from the caller.
        Ok(unsafe { ptr.read_unaligned() })
    }

    /// Like [`Accessor::set`] with `IndexOutOfBounds` instead of a panic.
    ///
    /// # Safety
    ///
    /// Same contract as [`Accessor::set`].
    pub unsafe fn try_set(&self, index: impl Into<Vector<usize, N>>, value: T) -> Result<()> {
        let ptr = self.element_ptr(index.into())?;
        // SAFETY: forwarded from the caller.
        unsafe { ptr.write_unaligned(value) };
        Ok(())
    }
}

impl<'a, T: AtomicElement, const N: usize> Accessor<'a, T, N> {
    /// Atomically apply `op` at `index` and return the previous value
    pub fn atomic(&self, index: impl Into<Vector<usize, N>>, op: AtomicOp, operand: T) -> Result<T> {
        let ptr = self.element_ptr(index.into())?;
        debug_assert_eq!(ptr as usize % std::mem::size_of::<T>(), 0);
        // SAFETY: in bounds and naturally aligned; non-atomic racing access
        // would already violate the get/set contracts.
        Ok(unsafe { T::atomic_rmw(ptr, op, operand) })
    }

    /// Atomic compare-and-swap at `index`; returns the previous value
    pub fn atomic_cas(&self, index: impl Into<Vector<usize, N>>, current: T, new: T) -> Result<T> {
        let ptr = self.element_ptr(index.into())?;
        // SAFETY: as in `atomic`.
        Ok(unsafe { T::atomic_cas(ptr, current, new) })
    }
}

impl<T, const N: usize> fmt::Debug for Accessor<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("extent", &self.layout.extent())
            .field("pitch_bytes", &self.layout.pitch_bytes())
            .finish()
    }
}
