//! Per-axis extent access
//!
//! Two families of entry points exist:
//!
//! - [`get_extent`] / [`set_extent`] take the axis as a const generic; an axis
//!   outside `[0, DIM)` fails to compile.
//! - [`try_extent`] / [`try_set_extent`] take the axis at runtime (e.g. read
//!   from configuration) and return [`ConfigError::AxisOutOfRange`] without
//!   touching the value.

use num_traits::{CheckedMul, One};

use crate::dim::{Dimensioned, SizeOf, SizeType};
use crate::error::{ConfigError, Result};
use crate::idx::Idx;
use crate::vec::Vector;

/// Per-axis magnitudes of a coordinate-like type.
///
/// Implementations may assume `axis < Self::DIM`; the free functions in this
/// module enforce it. Direct calls with a bad axis panic in debug builds.
pub trait Extent: Dimensioned + SizeType {
    /// Extent along `axis`
    fn extent_at(&self, axis: usize) -> Self::Size;

    /// Replace the extent along `axis`
    fn set_extent_at(&mut self, axis: usize, value: Self::Size);
}

/// Extent along the const axis `AXIS`
pub fn get_extent<const AXIS: usize, T: Extent>(value: &T) -> SizeOf<T> {
    const { assert!(AXIS < T::DIM, "extent axis out of range") };
    value.extent_at(AXIS)
}

/// Set the extent along the const axis `AXIS`
pub fn set_extent<const AXIS: usize, T: Extent>(value: &mut T, extent: SizeOf<T>) {
    const { assert!(AXIS < T::DIM, "extent axis out of range") };
    value.set_extent_at(AXIS, extent);
}

/// Extent along a runtime axis
pub fn try_extent<T: Extent>(value: &T, axis: usize) -> Result<SizeOf<T>> {
    check_axis::<T>(axis)?;
    Ok(value.extent_at(axis))
}

/// Set the extent along a runtime axis
pub fn try_set_extent<T: Extent>(value: &mut T, axis: usize, extent: SizeOf<T>) -> Result<()> {
    check_axis::<T>(axis)?;
    value.set_extent_at(axis, extent);
    Ok(())
}

/// All extents of `value` as a row-major vector
pub fn extents_of<const N: usize, T: Extent>(value: &T) -> Vector<SizeOf<T>, N> {
    const { assert!(N == T::DIM, "vector length must equal the dimension") };
    Vector::from_fn(|axis| value.extent_at(axis))
}

/// Number of elements covered by `value`'s extents
///
/// # Panics
///
/// Panics on overflow in debug builds; narrow size types overflow quickly.
/// [`checked_extent_product`] reports overflow instead.
pub fn extent_product<T: Extent>(value: &T) -> SizeOf<T> {
    (0..T::DIM).fold(<SizeOf<T> as One>::one(), |acc, axis| acc * value.extent_at(axis))
}

/// Number of elements covered by `value`'s extents, `None` on overflow
pub fn checked_extent_product<T: Extent>(value: &T) -> Option<SizeOf<T>> {
    (0..T::DIM).try_fold(<SizeOf<T> as One>::one(), |acc, axis| acc.checked_mul(&value.extent_at(axis)))
}

pub(crate) fn check_axis<T: Dimensioned>(axis: usize) -> Result<()> {
    if axis < T::DIM {
        Ok(())
    } else {
        Err(ConfigError::AxisOutOfRange { axis, dim: T::DIM })
    }
}

// ================================================================================================
// Implementations for scalars, arrays and vectors
// ================================================================================================

macro_rules! impl_scalar_dim {
    ($($ty:ty),*) => {
        $(
            impl Dimensioned for $ty {
                const DIM: usize = 1;
            }
        )*
    };
}

impl_scalar_dim!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

macro_rules! impl_scalar_extent {
    ($($ty:ty),*) => {
        $(
            impl SizeType for $ty {
                type Size = $ty;
            }

            impl Extent for $ty {
                fn extent_at(&self, axis: usize) -> $ty {
                    debug_assert!(axis == 0, "extent axis {axis} out of range for a scalar");
                    *self
                }

                fn set_extent_at(&mut self, axis: usize, value: $ty) {
                    debug_assert!(axis == 0, "extent axis {axis} out of range for a scalar");
                    *self = value;
                }
            }
        )*
    };
}

impl_scalar_extent!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl<T, const N: usize> Dimensioned for [T; N] {
    const DIM: usize = {
        assert!(N >= 1, "coordinate arrays need at least one axis");
        N
    };
}

impl<T: Idx, const N: usize> SizeType for [T; N] {
    type Size = T;
}

impl<T: Idx, const N: usize> Extent for [T; N] {
    fn extent_at(&self, axis: usize) -> T {
        self[axis]
    }

    fn set_extent_at(&mut self, axis: usize, value: T) {
        self[axis] = value;
    }
}

impl<T, const N: usize> Dimensioned for Vector<T, N> {
    const DIM: usize = {
        assert!(N >= 1, "coordinate vectors need at least one axis");
        N
    };
}

impl<T: Idx, const N: usize> SizeType for Vector<T, N> {
    type Size = T;
}

impl<T: Idx, const N: usize> Extent for Vector<T, N> {
    fn extent_at(&self, axis: usize) -> T {
        self[axis]
    }

    fn set_extent_at(&mut self, axis: usize, value: T) {
        self[axis] = value;
    }
}

impl<T: crate::elem::Element, const N: usize> crate::elem::ElemType for [T; N] {
    type Elem = T;
}

impl<T: crate::elem::Element, const N: usize> crate::elem::ElemType for Vector<T, N> {
    type Elem = T;
}
