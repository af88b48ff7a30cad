//! Explicit copies between buffers, views and host slices
//!
//! Copies move rows one at a time, so source and destination may use
//! different pitches. Extents must match exactly.

use std::ptr::NonNull;
use std::time::Instant;

use polyacc_core::Element;
use polyacc_tracing::{perf_span, performance};

use super::layout::PitchedLayout;
use crate::device::{Device, DeviceKind};
use crate::error::{BackendError, Result};

mod sealed {
    /// Proof that a call originates inside this crate
    #[derive(Clone, Copy)]
    pub struct Token(pub(crate) ());
}

pub(crate) use sealed::Token;

/// Readable N-dimensional memory: buffers, views and const views.
///
/// Only this crate's memory types implement it.
pub trait MemRead<T: Element, const N: usize> {
    type Device: Device;

    /// Device owning the memory
    fn device(&self) -> &Self::Device;

    /// Extent and pitch
    fn layout(&self) -> &PitchedLayout<N>;

    #[doc(hidden)]
    fn base_ptr(&self, token: Token) -> NonNull<u8>;
}

/// Writable N-dimensional memory
pub trait MemWrite<T: Element, const N: usize>: MemRead<T, N> {
    #[doc(hidden)]
    fn base_ptr_mut(&mut self, token: Token) -> NonNull<u8>;
}

fn direction(dst: DeviceKind, src: DeviceKind) -> &'static str {
    match (src, dst) {
        (DeviceKind::Host, DeviceKind::Host) => "H2H",
        (DeviceKind::Host, _) => "H2D",
        (_, DeviceKind::Host) => "D2H",
        _ => "D2D",
    }
}

/// Copy all of `src` into `dst`.
///
/// Fails with `ExtentMismatch` unless both extents are equal.
pub fn copy<T, const N: usize, Dst, Src>(dst: &mut Dst, src: &Src) -> Result<()>
where
    T: Element,
    Dst: MemWrite<T, N> + ?Sized,
    Src: MemRead<T, N> + ?Sized,
{
    let dst_layout = *dst.layout();
    let src_layout = *src.layout();
    if dst_layout.extent() != src_layout.extent() {
        return Err(BackendError::extent_mismatch(dst_layout.extent(), src_layout.extent()));
    }

    let bytes = dst_layout.row_bytes() * dst_layout.row_count();
    let direction = direction(dst.device().id().kind, src.device().id().kind);
    let _span = perf_span!("mem_copy", bytes = bytes, direction = direction);
    let start = Instant::now();

    let src_base = src.base_ptr(Token(()));
    let dst_base = dst.base_ptr_mut(Token(()));
    let row_bytes = dst_layout.row_bytes();
    for (dst_off, src_off) in dst_layout.row_offsets().zip(src_layout.row_offsets()) {
        // SAFETY: both offsets start rows inside their allocations, `dst` is
        // borrowed exclusively so the regions cannot overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(
                src_base.as_ptr().add(src_off),
                dst_base.as_ptr().add(dst_off),
                row_bytes,
            );
        }
    }

    performance::record_transfer(bytes, direction, start.elapsed().as_micros() as u64);
    Ok(())
}

/// Copy a dense row-major host slice into `dst`.
pub fn copy_from_slice<T, const N: usize, Dst>(dst: &mut Dst, src: &[T]) -> Result<()>
where
    T: Element,
    Dst: MemWrite<T, N> + ?Sized,
{
    let layout = *dst.layout();
    if src.len() != layout.len() {
        return Err(BackendError::extent_mismatch(
            format!("{} elements", layout.len()),
            format!("{} elements", src.len()),
        ));
    }

    let bytes: &[u8] = bytemuck::cast_slice(src);
    let start = Instant::now();
    let base = dst.base_ptr_mut(Token(()));
    let row_bytes = layout.row_bytes();
    for (row, dst_off) in layout.row_offsets().enumerate() {
        let chunk = &bytes[row * row_bytes..(row + 1) * row_bytes];
        // SAFETY: the row lies inside the destination allocation.
        unsafe {
            std::ptr::copy_nonoverlapping(chunk.as_ptr(), base.as_ptr().add(dst_off), row_bytes);
        }
    }

    let direction = direction(dst.device().id().kind, DeviceKind::Host);
    performance::record_transfer(bytes.len(), direction, start.elapsed().as_micros() as u64);
    Ok(())
}

/// Copy `src` into a new dense row-major vector.
pub fn copy_to_vec<T, const N: usize, Src>(src: &Src) -> Vec<T>
where
    T: Element,
    Src: MemRead<T, N> + ?Sized,
{
    let layout = *src.layout();
    let mut out = vec![T::default(); layout.len()];
    let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut out);
    let start = Instant::now();
    let base = src.base_ptr(Token(()));
    let row_bytes = layout.row_bytes();
    for (row, src_off) in layout.row_offsets().enumerate() {
        let chunk = &mut bytes[row * row_bytes..(row + 1) * row_bytes];
        // SAFETY: the row lies inside the source allocation.
        unsafe {
            std::ptr::copy_nonoverlapping(base.as_ptr().add(src_off), chunk.as_mut_ptr(), row_bytes);
        }
    }

    let direction = direction(DeviceKind::Host, src.device().id().kind);
    performance::record_transfer(bytes.len(), direction, start.elapsed().as_micros() as u64);
    out
}

/// Set every element of `dst` to `value`; padding is left untouched.
pub fn fill<T, const N: usize, Dst>(dst: &mut Dst, value: T)
where
    T: Element,
    Dst: MemWrite<T, N> + ?Sized,
{
    let layout = *dst.layout();
    let base = dst.base_ptr_mut(Token(()));
    let row_len = layout.extent()[N - 1];
    for offset in layout.row_offsets() {
        // SAFETY: the row lies inside the allocation and holds `row_len`
        // elements; `dst` is borrowed exclusively.
        unsafe {
            let row = base.as_ptr().add(offset).cast::<T>();
            for i in 0..row_len {
                row.add(i).write_unaligned(value);
            }
        }
    }
}
