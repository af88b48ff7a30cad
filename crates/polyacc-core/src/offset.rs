//! Per-axis offset access
//!
//! Mirrors [`crate::extent`]: const-axis accessors are checked at compile
//! time, runtime-axis accessors return [`ConfigError::AxisOutOfRange`](crate::ConfigError::AxisOutOfRange).

use crate::dim::{Dimensioned, SizeOf, SizeType};
use crate::error::Result;
use crate::extent::check_axis;
use crate::idx::Idx;
use crate::vec::Vector;

/// Per-axis displacement of a coordinate-like type
pub trait Offset: Dimensioned + SizeType {
    /// Offset along `axis`
    fn offset_at(&self, axis: usize) -> Self::Size;

    /// Replace the offset along `axis`
    fn set_offset_at(&mut self, axis: usize, value: Self::Size);
}

/// Offset along the const axis `AXIS`
pub fn get_offset<const AXIS: usize, T: Offset>(value: &T) -> SizeOf<T> {
    const { assert!(AXIS < T::DIM, "offset axis out of range") };
    value.offset_at(AXIS)
}

/// Set the offset along the const axis `AXIS`
pub fn set_offset<const AXIS: usize, T: Offset>(value: &mut T, offset: SizeOf<T>) {
    const { assert!(AXIS < T::DIM, "offset axis out of range") };
    value.set_offset_at(AXIS, offset);
}

/// Offset along a runtime axis
pub fn try_offset<T: Offset>(value: &T, axis: usize) -> Result<SizeOf<T>> {
    check_axis::<T>(axis)?;
    Ok(value.offset_at(axis))
}

/// Set the offset along a runtime axis
pub fn try_set_offset<T: Offset>(value: &mut T, axis: usize, offset: SizeOf<T>) -> Result<()> {
    check_axis::<T>(axis)?;
    value.set_offset_at(axis, offset);
    Ok(())
}

/// All offsets of `value` as a row-major vector
pub fn offsets_of<const N: usize, T: Offset>(value: &T) -> Vector<SizeOf<T>, N> {
    const { assert!(N == T::DIM, "vector length must equal the dimension") };
    Vector::from_fn(|axis| value.offset_at(axis))
}

macro_rules! impl_scalar_offset {
    ($($ty:ty),*) => {
        $(
            impl Offset for $ty {
                fn offset_at(&self, axis: usize) -> $ty {
                    debug_assert!(axis == 0, "offset axis {axis} out of range for a scalar");
                    *self
                }

                fn set_offset_at(&mut self, axis: usize, value: $ty) {
                    debug_assert!(axis == 0, "offset axis {axis} out of range for a scalar");
                    *self = value;
                }
            }
        )*
    };
}

impl_scalar_offset!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl<T: Idx, const N: usize> Offset for [T; N] {
    fn offset_at(&self, axis: usize) -> T {
        self[axis]
    }

    fn set_offset_at(&mut self, axis: usize, value: T) {
        self[axis] = value;
    }
}

impl<T: Idx, const N: usize> Offset for Vector<T, N> {
    fn offset_at(&self, axis: usize) -> T {
        self[axis]
    }

    fn set_offset_at(&mut self, axis: usize, value: T) {
        self[axis] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::UShort3;
    use crate::error::ConfigError;

    #[test]
    fn test_const_axis_offsets() {
        let mut offset = [1usize, 2, 3];
        assert_eq!(get_offset::<2, _>(&offset), 3);
        set_offset::<1, _>(&mut offset, 7);
        assert_eq!(offset, [1, 7, 3]);
    }

    #[test]
    fn test_runtime_axis_offsets() {
        let mut offset = UShort3::new(1, 2, 3);
        assert_eq!(try_offset(&offset, 0), Ok(3));
        try_set_offset(&mut offset, 2, 9).unwrap();
        assert_eq!(offset.x, 9);
        assert_eq!(
            try_offset(&offset, 3),
            Err(ConfigError::AxisOutOfRange { axis: 3, dim: 3 })
        );
    }

    #[test]
    fn test_offsets_of_vector() {
        let offset = Vector::new([5u32, 6]);
        assert_eq!(offsets_of::<2, _>(&offset), offset);
    }
}
