//! Non-owning views over existing memory
//!
//! A [`View`] borrows memory mutably and is not `Clone`; pass it on with
//! [`View::reborrow`]. A [`ConstView`] borrows for reading and is `Clone`.
//! Neither ever frees what it points to.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use polyacc_core::{Dimensioned, ElemType, Element, Idx, SizeType, Vector};

use super::accessor::{Accessor, ReadAccessor};
use super::copy::{self, MemRead, MemWrite, Token};
use super::layout::PitchedLayout;
use crate::device::{Device, HostAccessible};
use crate::error::{BackendError, Result};

fn usize_extent<I: Idx, const N: usize>(extent: &Vector<I, N>) -> Result<Vector<usize, N>> {
    let mut dims = [0usize; N];
    for (dst, &src) in dims.iter_mut().zip(extent.iter()) {
        *dst = src.to_usize_checked()?;
    }
    Ok(Vector::new(dims))
}

fn layout_for<T: Element, I: Idx, const N: usize>(
    extent: &Vector<I, N>,
    row_pitch: Option<usize>,
) -> Result<PitchedLayout<N>> {
    let dims = usize_extent(extent)?;
    let elem_size = std::mem::size_of::<T>();
    match row_pitch {
        Some(pitch) => PitchedLayout::with_row_pitch(dims, elem_size, pitch),
        None => PitchedLayout::contiguous(dims, elem_size),
    }
}

/// Bytes a layout touches, trailing padding of the last row excluded
fn span_bytes<const N: usize>(layout: &PitchedLayout<N>) -> usize {
    layout
        .row_offsets()
        .last()
        .map_or(0, |offset| offset + layout.row_bytes())
}

fn check_slice_covers<T, const N: usize>(slice_len: usize, layout: &PitchedLayout<N>) -> Result<()> {
    let available = slice_len * std::mem::size_of::<T>();
    let required = span_bytes(layout);
    if available < required {
        return Err(BackendError::extent_mismatch(
            format!("{required} bytes for extent {}", layout.extent()),
            format!("{available} bytes"),
        ));
    }
    Ok(())
}

/// Mutable view of memory owned elsewhere
pub struct View<'a, T: Element, D: Device, const N: usize, I: Idx = usize> {
    base: NonNull<u8>,
    device: D,
    extent: Vector<I, N>,
    layout: PitchedLayout<N>,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: a View behaves like `&'a mut [T]`.
unsafe impl<T: Element, D: Device, const N: usize, I: Idx> Send for View<'_, T, D, N, I> {}
unsafe impl<T: Element, D: Device, const N: usize, I: Idx> Sync for View<'_, T, D, N, I> {}

impl<'a, T: Element, D: Device, const N: usize, I: Idx> View<'a, T, D, N, I> {
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `layout` and reached
    /// through no other path during `'a`.
    pub(crate) unsafe fn from_parts(base: NonNull<u8>, device: D, extent: Vector<I, N>, layout: PitchedLayout<N>) -> Self {
        Self {
            base,
            device,
            extent,
            layout,
            _marker: PhantomData,
        }
    }

    /// Wrap raw memory, dense or with an explicit row pitch in bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of every element the layout
    /// addresses, belong to `device`, and not be accessed through any other
    /// path during `'a`.
    pub unsafe fn from_raw_parts(
        ptr: NonNull<T>,
        device: D,
        extent: impl Into<Vector<I, N>>,
        row_pitch: Option<usize>,
    ) -> Result<Self> {
        let extent = extent.into();
        let layout = layout_for::<T, I, N>(&extent, row_pitch)?;
        // SAFETY: forwarded from the caller.
        Ok(unsafe { Self::from_parts(ptr.cast(), device, extent, layout) })
    }

    pub fn extent(&self) -> Vector<I, N> {
        self.extent
    }

    pub fn layout(&self) -> &PitchedLayout<N> {
        &self.layout
    }

    pub fn pitch_bytes(&self) -> Vector<usize, N> {
        self.layout.pitch_bytes()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Shorter-lived view of the same memory
    pub fn reborrow(&mut self) -> View<'_, T, D, N, I> {
        // SAFETY: the new view holds `&mut self` for its lifetime.
        unsafe { View::from_parts(self.base, self.device.clone(), self.extent, self.layout) }
    }

    /// Read-only view of the same memory
    pub fn as_const(&self) -> ConstView<'_, T, D, N, I> {
        // SAFETY: the new view holds `&self` for its lifetime.
        unsafe { ConstView::from_parts(self.base, self.device.clone(), self.extent, self.layout) }
    }

    pub fn accessor(&self) -> ReadAccessor<'_, T, N> {
        // SAFETY: `&self` blocks writes through this view.
        unsafe { ReadAccessor::new(self.base, self.layout) }
    }

    pub fn accessor_mut(&mut self) -> Accessor<'_, T, N> {
        // SAFETY: `&mut self` is exclusive.
        unsafe { Accessor::new(self.base, self.layout) }
    }

    pub fn copy_from_slice(&mut self, src: &[T]) -> Result<()> {
        copy::copy_from_slice(self, src)
    }

    pub fn to_vec(&self) -> Vec<T> {
        copy::copy_to_vec(self)
    }

    pub fn fill(&mut self, value: T) {
        copy::fill(self, value)
    }
}

impl<'a, T: Element, D: HostAccessible, const N: usize, I: Idx> View<'a, T, D, N, I> {
    /// View a dense host slice as an N-dimensional region.
    ///
    /// The slice length must equal the extent's element count.
    pub fn from_slice(device: &D, slice: &'a mut [T], extent: impl Into<Vector<I, N>>) -> Result<Self> {
        let extent = extent.into();
        let layout = layout_for::<T, I, N>(&extent, None)?;
        if slice.len() != layout.len() {
            return Err(BackendError::extent_mismatch(
                format!("{} elements", layout.len()),
                format!("{} elements", slice.len()),
            ));
        }
        let base = NonNull::from(slice).cast::<u8>();
        // SAFETY: the slice is borrowed mutably for 'a and covers the layout.
        Ok(unsafe { Self::from_parts(base, device.clone(), extent, layout) })
    }

    /// View a host slice whose rows are `row_pitch` bytes apart
    pub fn from_slice_pitched(
        device: &D,
        slice: &'a mut [T],
        extent: impl Into<Vector<I, N>>,
        row_pitch: usize,
    ) -> Result<Self> {
        let extent = extent.into();
        let layout = layout_for::<T, I, N>(&extent, Some(row_pitch))?;
        check_slice_covers::<T, N>(slice.len(), &layout)?;
        let base = NonNull::from(slice).cast::<u8>();
        // SAFETY: the slice is borrowed mutably for 'a and covers the layout.
        Ok(unsafe { Self::from_parts(base, device.clone(), extent, layout) })
    }

    /// Elements as a dense slice; `UnsupportedOperation` when rows are padded
    pub fn as_slice(&self) -> Result<&[T]> {
        if !self.layout.is_contiguous() {
            return Err(BackendError::unsupported("as_slice on a pitched view"));
        }
        // SAFETY: host memory, contiguous, covered by the borrow.
        Ok(unsafe { std::slice::from_raw_parts(self.base.as_ptr().cast::<T>(), self.layout.len()) })
    }

    /// Elements as a dense mutable slice; `UnsupportedOperation` when rows are padded
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        if !self.layout.is_contiguous() {
            return Err(BackendError::unsupported("as_mut_slice on a pitched view"));
        }
        // SAFETY: as in `as_slice`, with exclusive access.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr().cast::<T>(), self.layout.len()) })
    }
}

impl<T: Element, D: Device, const N: usize, I: Idx> MemRead<T, N> for View<'_, T, D, N, I> {
    type Device = D;

    fn device(&self) -> &D {
        &self.device
    }

    fn layout(&self) -> &PitchedLayout<N> {
        &self.layout
    }

    fn base_ptr(&self, _: Token) -> NonNull<u8> {
        self.base
    }
}

impl<T: Element, D: Device, const N: usize, I: Idx> MemWrite<T, N> for View<'_, T, D, N, I> {
    fn base_ptr_mut(&mut self, _: Token) -> NonNull<u8> {
        self.base
    }
}

impl<T: Element, D: Device, const N: usize, I: Idx> fmt::Debug for View<'_, T, D, N, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("elem", &T::KIND)
            .field("device", &self.device.id())
            .field("extent", &self.extent)
            .field("pitch_bytes", &self.layout.pitch_bytes())
            .finish()
    }
}

/// Read-only view of memory owned elsewhere
pub struct ConstView<'a, T: Element, D: Device, const N: usize, I: Idx = usize> {
    base: NonNull<u8>,
    device: D,
    extent: Vector<I, N>,
    layout: PitchedLayout<N>,
    _marker: PhantomData<&'a [T]>,
}

impl<T: Element, D: Device, const N: usize, I: Idx> Clone for ConstView<'_, T, D, N, I> {
    fn clone(&self) -> Self {
        Self {
            base: self.base,
            device: self.device.clone(),
            extent: self.extent,
            layout: self.layout,
            _marker: PhantomData,
        }
    }
}

// SAFETY: a ConstView behaves like `&'a [T]`.
unsafe impl<T: Element, D: Device, const N: usize, I: Idx> Send for ConstView<'_, T, D, N, I> {}
unsafe impl<T: Element, D: Device, const N: usize, I: Idx> Sync for ConstView<'_, T, D, N, I> {}

impl<'a, T: Element, D: Device, const N: usize, I: Idx> ConstView<'a, T, D, N, I> {
    /// # Safety
    ///
    /// `base` must be valid for reads of `layout` and not written during `'a`.
    pub(crate) unsafe fn from_parts(base: NonNull<u8>, device: D, extent: Vector<I, N>, layout: PitchedLayout<N>) -> Self {
        Self {
            base,
            device,
            extent,
            layout,
            _marker: PhantomData,
        }
    }

    /// Wrap raw read-only memory, dense or with an explicit row pitch.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of every element the layout addresses,
    /// belong to `device`, and not be written during `'a`.
    pub unsafe fn from_raw_parts(
        ptr: NonNull<T>,
        device: D,
        extent: impl Into<Vector<I, N>>,
        row_pitch: Option<usize>,
    ) -> Result<Self> {
        let extent = extent.into();
        let layout = layout_for::<T, I, N>(&extent, row_pitch)?;
        // SAFETY: forwarded from the caller.
        Ok(unsafe { Self::from_parts(ptr.cast(), device, extent, layout) })
    }

    pub fn extent(&self) -> Vector<I, N> {
        self.extent
    }

    pub fn layout(&self) -> &PitchedLayout<N> {
        &self.layout
    }

    pub fn pitch_bytes(&self) -> Vector<usize, N> {
        self.layout.pitch_bytes()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn accessor(&self) -> ReadAccessor<'a, T, N> {
        // SAFETY: the memory is immutable for 'a.
        unsafe { ReadAccessor::new(self.base, self.layout) }
    }

    pub fn to_vec(&self) -> Vec<T> {
        copy::copy_to_vec(self)
    }
}

impl<'a, T: Element, D: HostAccessible, const N: usize, I: Idx> ConstView<'a, T, D, N, I> {
    /// View a dense host slice as an N-dimensional region
    pub fn from_slice(device: &D, slice: &'a [T], extent: impl Into<Vector<I, N>>) -> Result<Self> {
        let extent = extent.into();
        let layout = layout_for::<T, I, N>(&extent, None)?;
        if slice.len() != layout.len() {
            return Err(BackendError::extent_mismatch(
                format!("{} elements", layout.len()),
                format!("{} elements", slice.len()),
            ));
        }
        let base = NonNull::from(slice).cast::<u8>();
        // SAFETY: the slice is borrowed for 'a and covers the layout.
        Ok(unsafe { Self::from_parts(base, device.clone(), extent, layout) })
    }

    /// View a host slice whose rows are `row_pitch` bytes apart
    pub fn from_slice_pitched(
        device: &D,
        slice: &'a [T],
        extent: impl Into<Vector<I, N>>,
        row_pitch: usize,
    ) -> Result<Self> {
        let extent = extent.into();
        let layout = layout_for::<T, I, N>(&extent, Some(row_pitch))?;
        check_slice_covers::<T, N>(slice.len(), &layout)?;
        let base = NonNull::from(slice).cast::<u8>();
        // SAFETY: the slice is borrowed for 'a and covers the layout.
        Ok(unsafe { Self::from_parts(base, device.clone(), extent, layout) })
    }

    pub fn as_slice(&self) -> Result<&'a [T]> {
        if !self.layout.is_contiguous() {
            return Err(BackendError::unsupported("as_slice on a pitched view"));
        }
        // SAFETY: host memory, contiguous, immutable for 'a.
        Ok(unsafe { std::slice::from_raw_parts(self.base.as_ptr().cast::<T>(), self.layout.len()) })
    }
}

impl<T: Element, D: Device, const N: usize, I: Idx> MemRead<T, N> for ConstView<'_, T, D, N, I> {
    type Device = D;

    fn device(&self) -> &D {
        &self.device
    }

    fn layout(&self) -> &PitchedLayout<N> {
        &self.layout
    }

    fn base_ptr(&self, _: Token) -> NonNull<u8> {
        self.base
    }
}

impl<T: Element, D: Device, const N: usize, I: Idx> fmt::Debug for ConstView<'_, T, D, N, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstView")
            .field("elem", &T::KIND)
            .field("device", &self.device.id())
            .field("extent", &self.extent)
            .field("pitch_bytes", &self.layout.pitch_bytes())
            .finish()
    }
}

macro_rules! impl_view_traits {
    ($($view:ident),*) => {
        $(
            impl<T: Element, D: Device, const N: usize, I: Idx> Dimensioned for $view<'_, T, D, N, I> {
                const DIM: usize = N;
            }

            impl<T: Element, D: Device, const N: usize, I: Idx> SizeType for $view<'_, T, D, N, I> {
                type Size = I;
            }

            impl<T: Element, D: Device, const N: usize, I: Idx> ElemType for $view<'_, T, D, N, I> {
                type Elem = T;
            }
        )*
    };
}

impl_view_traits!(View, ConstView);
