//! Dimensionality of coordinate-like types

/// Fixed dimensionality of a coordinate-like type.
///
/// `DIM` is at least 1 and is the same for every query made against the type.
/// Scalars have dimension 1 by convention.
pub trait Dimensioned {
    const DIM: usize;
}

/// Dimension of `T`
pub const fn dim_of<T: Dimensioned>() -> usize {
    T::DIM
}

/// Size type of a coordinate-like type
pub trait SizeType {
    type Size: crate::idx::Idx;
}

/// Size type of `T`
pub type SizeOf<T> = <T as SizeType>::Size;
