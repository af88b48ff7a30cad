//! Element types backing coordinates and buffers

use std::fmt;

/// Runtime tag for a scalar element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ElemKind {
    /// Get size in bytes
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Check if this is a floating-point type
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Check if this is a signed type
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::F32 | Self::F64
        )
    }
}

impl fmt::Display for ElemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}

/// Scalar type that can live in device memory.
///
/// The `Pod` bound lets buffers and shared-memory arenas move elements as raw
/// bytes without any per-type code.
pub trait Element: bytemuck::Pod + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Runtime tag of this element type
    const KIND: ElemKind;
}

/// Resolves the component type of a coordinate-like type.
///
/// For scalars this is the scalar itself; for 1-4 component vectors it is the
/// component type, independent of the vector's dimension.
pub trait ElemType {
    type Elem: Element;
}

macro_rules! impl_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const KIND: ElemKind = ElemKind::$kind;
            }

            impl ElemType for $ty {
                type Elem = $ty;
            }
        )*
    };
}

impl_element!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

/// Element type of `T`
pub type ElemOf<T> = <T as ElemType>::Elem;
