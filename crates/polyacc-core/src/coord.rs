//! 1-4 component coordinate structs in accelerator vector layout
//!
//! These mirror the builtin vector types of GPU toolchains: `x`, `y`, `z`,
//! `w` fields laid out in that order in memory. The axis mapping follows the
//! row-major convention of [`Vector`](crate::Vector): axis `DIM - 1` is `x`,
//! the fastest varying component.
//!
//! ```text
//! Vec3 { x, y, z }
//!   axis 0 -> z
//!   axis 1 -> y
//!   axis 2 -> x
//! ```

use crate::dim::{Dimensioned, SizeType};
use crate::elem::{ElemType, Element};
use crate::extent::Extent;
use crate::idx::Idx;
use crate::offset::Offset;
use crate::vec::Vector;

macro_rules! define_coord {
    ($(#[$meta:meta])* $name:ident, $dim:literal, [$($field:ident),+], [$($axis_field:ident),+]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        #[repr(C)]
        pub struct $name<T> {
            $(pub $field: T,)+
        }

        impl<T> $name<T> {
            /// Create from components in field order
            pub const fn new($($field: T),+) -> Self {
                Self { $($field),+ }
            }
        }

        impl<T: Copy> $name<T> {
            /// Component along `axis`, `None` outside `[0, DIM)`
            pub fn get_axis(&self, axis: usize) -> Option<T> {
                let axes = [$(self.$axis_field),+];
                axes.get(axis).copied()
            }

            /// Mutable component along `axis`, `None` outside `[0, DIM)`
            pub fn axis_mut(&mut self, axis: usize) -> Option<&mut T> {
                let axes = [$(&mut self.$axis_field),+];
                axes.into_iter().nth(axis)
            }

            /// Convert to a row-major [`Vector`]
            pub fn to_vector(&self) -> Vector<T, $dim> {
                Vector::new([$(self.$axis_field),+])
            }

            /// Build from a row-major [`Vector`]
            pub fn from_vector(v: Vector<T, $dim>) -> Self {
                let [$($axis_field),+] = v.into_array();
                Self { $($field: $field),+ }
            }
        }

        impl<T> Dimensioned for $name<T> {
            const DIM: usize = $dim;
        }

        impl<T: Element> ElemType for $name<T> {
            type Elem = T;
        }

        impl<T: Idx> SizeType for $name<T> {
            type Size = T;
        }

        impl<T: Idx> Extent for $name<T> {
            fn extent_at(&self, axis: usize) -> T {
                debug_assert!(axis < $dim, "extent axis {axis} out of range for {}", stringify!($name));
                self.get_axis(axis).unwrap_or_else(T::zero)
            }

            fn set_extent_at(&mut self, axis: usize, value: T) {
                debug_assert!(axis < $dim, "extent axis {axis} out of range for {}", stringify!($name));
                if let Some(slot) = self.axis_mut(axis) {
                    *slot = value;
                }
            }
        }

        impl<T: Idx> Offset for $name<T> {
            fn offset_at(&self, axis: usize) -> T {
                debug_assert!(axis < $dim, "offset axis {axis} out of range for {}", stringify!($name));
                self.get_axis(axis).unwrap_or_else(T::zero)
            }

            fn set_offset_at(&mut self, axis: usize, value: T) {
                debug_assert!(axis < $dim, "offset axis {axis} out of range for {}", stringify!($name));
                if let Some(slot) = self.axis_mut(axis) {
                    *slot = value;
                }
            }
        }
    };
}

define_coord!(
    /// One-component coordinate
    Vec1, 1, [x], [x]
);
define_coord!(
    /// Two-component coordinate
    Vec2, 2, [x, y], [y, x]
);
define_coord!(
    /// Three-component coordinate
    Vec3, 3, [x, y, z], [z, y, x]
);
define_coord!(
    /// Four-component coordinate
    Vec4, 4, [x, y, z, w], [w, z, y, x]
);

/// Grid and block extents in the three-axis launch form
pub type Dim3 = Vec3<u32>;

macro_rules! coord_aliases {
    ($($elem:ty => $one:ident, $two:ident, $three:ident, $four:ident;)*) => {
        $(
            pub type $one = Vec1<$elem>;
            pub type $two = Vec2<$elem>;
            pub type $three = Vec3<$elem>;
            pub type $four = Vec4<$elem>;
        )*
    };
}

coord_aliases! {
    i8 => Char1, Char2, Char3, Char4;
    u8 => UChar1, UChar2, UChar3, UChar4;
    i16 => Short1, Short2, Short3, Short4;
    u16 => UShort1, UShort2, UShort3, UShort4;
    i32 => Int1, Int2, Int3, Int4;
    u32 => UInt1, UInt2, UInt3, UInt4;
    i64 => Long1, Long2, Long3, Long4;
    u64 => ULong1, ULong2, ULong3, ULong4;
    i64 => LongLong1, LongLong2, LongLong3, LongLong4;
    u64 => ULongLong1, ULongLong2, ULongLong3, ULongLong4;
    f32 => Float1, Float2, Float3, Float4;
    f64 => Double1, Double2, Double3, Double4;
}
