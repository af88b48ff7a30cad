//! Coordinate kind table
//!
//! Every coordinate type known to the crate is described by a [`CoordKind`]:
//! its shape (scalar or 1-4 component vector) and its component element kind.
//! One `const` table maps the shape to its dimension, so dimension and element
//! queries are answered by lookup instead of per-type predicates.
//!
//! Kinds can also be parsed from the accelerator vector type names
//! (`"uint3"`, `"float2"`, `"dim3"`, ...), which is how configuration files
//! refer to coordinate types.

use std::fmt;
use std::str::FromStr;

use crate::coord::{Vec1, Vec2, Vec3, Vec4};
use crate::dim::Dimensioned;
use crate::elem::{ElemKind, ElemType, Element};
use crate::error::ConfigError;

/// Component layout of a coordinate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Vec1,
    Vec2,
    Vec3,
    Vec4,
}

/// Dimension of each shape, indexed by `Shape as usize`
const SHAPE_DIMS: [usize; 5] = [1, 1, 2, 3, 4];

impl Shape {
    /// Dimension of this shape
    pub const fn dim(self) -> usize {
        SHAPE_DIMS[self as usize]
    }

    /// Vector shape with `components` components
    pub const fn vector(components: usize) -> Option<Self> {
        match components {
            1 => Some(Self::Vec1),
            2 => Some(Self::Vec2),
            3 => Some(Self::Vec3),
            4 => Some(Self::Vec4),
            _ => None,
        }
    }
}

/// Shape and element kind of a coordinate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKind {
    pub shape: Shape,
    pub elem: ElemKind,
}

/// C vector family names and their component kinds
const FAMILIES: [(&str, ElemKind); 12] = [
    ("char", ElemKind::I8),
    ("uchar", ElemKind::U8),
    ("short", ElemKind::I16),
    ("ushort", ElemKind::U16),
    ("int", ElemKind::I32),
    ("uint", ElemKind::U32),
    ("long", ElemKind::I64),
    ("ulong", ElemKind::U64),
    ("longlong", ElemKind::I64),
    ("ulonglong", ElemKind::U64),
    ("float", ElemKind::F32),
    ("double", ElemKind::F64),
];

impl CoordKind {
    pub const fn new(shape: Shape, elem: ElemKind) -> Self {
        Self { shape, elem }
    }

    /// Dimension of the coordinate type
    pub const fn dim(self) -> usize {
        self.shape.dim()
    }

    /// Element kind of the coordinate type
    pub const fn elem(self) -> ElemKind {
        self.elem
    }

    /// Check if this is one of the 1-4 component vector kinds
    pub const fn is_vector(self) -> bool {
        !matches!(self.shape, Shape::Scalar)
    }

    /// Parse an accelerator vector type name such as `uint3` or `dim3`
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let name = name.trim();
        if name == "dim3" {
            return Ok(Self::new(Shape::Vec3, ElemKind::U32));
        }

        let split = name
            .char_indices()
            .last()
            .filter(|(_, c)| c.is_ascii_digit())
            .map(|(i, _)| i)
            .ok_or_else(|| ConfigError::parse("coordinate kind", name))?;
        let (family, count) = name.split_at(split);

        let shape = count
            .parse::<usize>()
            .ok()
            .and_then(Shape::vector)
            .ok_or_else(|| ConfigError::parse("coordinate kind", name))?;

        FAMILIES
            .iter()
            .find(|(f, _)| *f == family)
            .map(|&(_, elem)| Self::new(shape, elem))
            .ok_or_else(|| ConfigError::parse("coordinate kind", name))
    }
}

impl FromStr for CoordKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for CoordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            Shape::Scalar => write!(f, "{}", self.elem),
            shape => write!(f, "{}x{}", self.elem, shape.dim()),
        }
    }
}

/// Coordinate type with a statically known kind
pub trait Coord: Dimensioned + ElemType {
    const KIND: CoordKind;
}

macro_rules! impl_scalar_coord {
    ($($ty:ty),*) => {
        $(
            impl Coord for $ty {
                const KIND: CoordKind = CoordKind::new(Shape::Scalar, <$ty as Element>::KIND);
            }
        )*
    };
}

impl_scalar_coord!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl<T: Element> Coord for Vec1<T> {
    const KIND: CoordKind = CoordKind::new(Shape::Vec1, T::KIND);
}

impl<T: Element> Coord for Vec2<T> {
    const KIND: CoordKind = CoordKind::new(Shape::Vec2, T::KIND);
}

impl<T: Element> Coord for Vec3<T> {
    const KIND: CoordKind = CoordKind::new(Shape::Vec3, T::KIND);
}

impl<T: Element> Coord for Vec4<T> {
    const KIND: CoordKind = CoordKind::new(Shape::Vec4, T::KIND);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::*;

    fn assert_consistent<T: Coord>() {
        assert_eq!(T::KIND.dim(), T::DIM);
        assert_eq!(T::KIND.elem(), <T::Elem as Element>::KIND);
    }

    #[test]
    fn test_table_matches_static_traits() {
        assert_consistent::<u32>();
        assert_consistent::<f64>();
        assert_consistent::<Char1>();
        assert_consistent::<UShort2>();
        assert_consistent::<Int3>();
        assert_consistent::<ULongLong4>();
        assert_consistent::<Float3>();
        assert_consistent::<Dim3>();
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            CoordKind::from_name("uint3").unwrap(),
            CoordKind::new(Shape::Vec3, ElemKind::U32)
        );
        assert_eq!(CoordKind::from_name("dim3").unwrap(), Dim3::KIND);
        assert_eq!(CoordKind::from_name("ulonglong2").unwrap(), ULongLong2::KIND);
        assert_eq!("double4".parse::<CoordKind>().unwrap(), Double4::KIND);
        assert_eq!(CoordKind::from_name("char1").unwrap().dim(), 1);
    }

    #[test]
    fn test_from_name_rejects_unknown() {
        for name in ["uint5", "uint0", "half2", "float", "", "3"] {
            assert!(
                matches!(CoordKind::from_name(name), Err(ConfigError::Parse { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Float2::KIND.to_string(), "f32x2");
        assert_eq!(<i16 as Coord>::KIND.to_string(), "i16");
    }
}
