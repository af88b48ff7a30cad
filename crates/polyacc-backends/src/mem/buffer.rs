//! Owning N-dimensional buffers

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::time::Instant;

use polyacc_core::{Dimensioned, ElemType, Element, Idx, SizeType, Vector};
use polyacc_tracing::performance;

use super::accessor::{Accessor, ReadAccessor};
use super::copy::{self, MemRead, MemWrite, Token};
use super::layout::PitchedLayout;
use super::raw::DeviceAllocation;
use super::view::{ConstView, View};
use crate::device::{Device, HostAccessible};
use crate::error::{AllocationError, BackendError, Result};

/// Zero-initialized memory owned by one device.
///
/// The extent is fixed at allocation. Dropping the buffer frees the memory
/// and returns its bytes to the device ledger.
pub struct Buffer<T: Element, D: Device, const N: usize, I: Idx = usize> {
    allocation: DeviceAllocation<D>,
    extent: Vector<I, N>,
    layout: PitchedLayout<N>,
    _elem: PhantomData<T>,
}

impl<T: Element, D: Device, const N: usize, I: Idx> Buffer<T, D, N, I> {
    /// Allocate a dense buffer of `extent` elements on `device`
    pub fn allocate(device: &D, extent: impl Into<Vector<I, N>>) -> Result<Self> {
        Self::allocate_with_alignment(device, extent.into(), 1)
    }

    /// Allocate a buffer whose rows are padded to the device's pitch alignment
    pub fn allocate_pitched(device: &D, extent: impl Into<Vector<I, N>>) -> Result<Self> {
        Self::allocate_with_alignment(device, extent.into(), device.props().pitch_alignment)
    }

    fn allocate_with_alignment(device: &D, extent: Vector<I, N>, alignment: usize) -> Result<Self> {
        const { assert!(N >= 1, "buffers need at least one axis") };

        let mut dims = [0usize; N];
        for (axis, (dst, &src)) in dims.iter_mut().zip(extent.iter()).enumerate() {
            *dst = src.to_usize_checked()?;
            if *dst == 0 {
                tracing::debug!(axis, extent = %extent, "zero_sized_allocation_rejected");
                return Err(AllocationError::ZeroSized {
                    extent: extent.to_string(),
                }
                .into());
            }
        }

        let layout = PitchedLayout::pitched(Vector::new(dims), std::mem::size_of::<T>(), alignment)?;
        let start = Instant::now();
        let allocation = DeviceAllocation::new(device, layout.size_bytes())?;

        let pitch = if N >= 2 { layout.pitch_bytes()[N - 2] } else { layout.row_bytes() };
        performance::record_allocation(
            layout.size_bytes(),
            &device.id().to_string(),
            pitch,
            start.elapsed().as_micros() as u64,
        );

        Ok(Self {
            allocation,
            extent,
            layout,
            _elem: PhantomData,
        })
    }

    /// Elements per axis
    pub fn extent(&self) -> Vector<I, N> {
        self.extent
    }

    /// Extent and pitch of the allocation
    pub fn layout(&self) -> &PitchedLayout<N> {
        &self.layout
    }

    /// Byte pitch per axis
    pub fn pitch_bytes(&self) -> Vector<usize, N> {
        self.layout.pitch_bytes()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    /// Always false: zero extents are rejected at allocation
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    /// Bytes reserved on the device, padding included
    pub fn size_bytes(&self) -> usize {
        self.allocation.bytes()
    }

    /// Owning device
    pub fn device(&self) -> &D {
        self.allocation.device()
    }

    /// Read-only element access for kernels
    pub fn accessor(&self) -> ReadAccessor<'_, T, N> {
        // SAFETY: the allocation matches the layout and `&self` blocks writes.
        unsafe { ReadAccessor::new(self.allocation.as_ptr(), self.layout) }
    }

    /// Shared read-write element access for kernels
    pub fn accessor_mut(&mut self) -> Accessor<'_, T, N> {
        // SAFETY: the allocation matches the layout and `&mut self` is exclusive.
        unsafe { Accessor::new(self.allocation.as_ptr(), self.layout) }
    }

    /// Non-owning mutable view of the whole buffer
    pub fn view(&mut self) -> View<'_, T, D, N, I> {
        // SAFETY: the allocation outlives the borrow and matches the layout.
        unsafe { View::from_parts(self.allocation.as_ptr(), self.device().clone(), self.extent, self.layout) }
    }

    /// Non-owning read-only view of the whole buffer
    pub fn const_view(&self) -> ConstView<'_, T, D, N, I> {
        // SAFETY: as in `view`, for reads only.
        unsafe { ConstView::from_parts(self.allocation.as_ptr(), self.device().clone(), self.extent, self.layout) }
    }

    /// Copy a dense row-major slice into the buffer
    pub fn copy_from_slice(&mut self, src: &[T]) -> Result<()> {
        copy::copy_from_slice(self, src)
    }

    /// Copy the buffer into a dense row-major vector
    pub fn to_vec(&self) -> Vec<T> {
        copy::copy_to_vec(self)
    }

    /// Set every element to `value`
    pub fn fill(&mut self, value: T) {
        copy::fill(self, value)
    }
}

impl<T: Element, D: HostAccessible, const N: usize, I: Idx> Buffer<T, D, N, I> {
    /// Elements as a dense slice; `UnsupportedOperation` when rows are padded
    pub fn as_slice(&self) -> Result<&[T]> {
        if !self.layout.is_contiguous() {
            return Err(BackendError::unsupported("as_slice on a pitched buffer"));
        }
        // SAFETY: host memory, contiguous, zero-initialized Pod elements.
        Ok(unsafe { std::slice::from_raw_parts(self.allocation.as_ptr().as_ptr().cast::<T>(), self.layout.len()) })
    }

    /// Elements as a dense mutable slice; `UnsupportedOperation` when rows are padded
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        if !self.layout.is_contiguous() {
            return Err(BackendError::unsupported("as_mut_slice on a pitched buffer"));
        }
        // SAFETY: as in `as_slice`, with exclusive access.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.allocation.as_ptr().as_ptr().cast::<T>(), self.layout.len()) })
    }

    /// New buffer with the same extent, layout and contents
    pub fn try_clone(&self) -> Result<Self> {
        let alignment = if self.layout.is_contiguous() {
            1
        } else {
            self.device().props().pitch_alignment
        };
        let mut out = Self::allocate_with_alignment(self.device(), self.extent, alignment)?;
        copy::copy(&mut out, self)?;
        Ok(out)
    }
}

impl<T: Element, D: Device, const N: usize, I: Idx> MemRead<T, N> for Buffer<T, D, N, I> {
    type Device = D;

    fn device(&self) -> &D {
        self.allocation.device()
    }

    fn layout(&self) -> &PitchedLayout<N> {
        &self.layout
    }

    fn base_ptr(&self, _: Token) -> NonNull<u8> {
        self.allocation.as_ptr()
    }
}

impl<T: Element, D: Device, const N: usize, I: Idx> MemWrite<T, N> for Buffer<T, D, N, I> {
    fn base_ptr_mut(&mut self, _: Token) -> NonNull<u8> {
        self.allocation.as_ptr()
    }
}

impl<T: Element, D: Device, const N: usize, I: Idx> Dimensioned for Buffer<T, D, N, I> {
    const DIM: usize = N;
}

impl<T: Element, D: Device, const N: usize, I: Idx> SizeType for Buffer<T, D, N, I> {
    type Size = I;
}

impl<T: Element, D: Device, const N: usize, I: Idx> ElemType for Buffer<T, D, N, I> {
    type Elem = T;
}

impl<T: Element, D: Device, const N: usize, I: Idx> fmt::Debug for Buffer<T, D, N, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("elem", &T::KIND)
            .field("device", &self.device().id())
            .field("extent", &self.extent)
            .field("pitch_bytes", &self.layout.pitch_bytes())
            .finish()
    }
}
