//! Capability traits for polyacc kernels
//!
//! A kernel is written once against these traits and runs on every backend in
//! `polyacc-backends`. This crate has no notion of devices or memory; it only
//! answers questions about coordinate-like types:
//!
//! - **Dimension**: [`Dimensioned::DIM`], fixed per type, at least 1
//! - **Index / size type**: [`SizeType::Size`], an [`Idx`] integer
//! - **Extent / offset**: per-axis accessors with the axis checked at compile
//!   time ([`get_extent`]) or at configuration time ([`try_extent`])
//! - **Element type**: [`ElemType::Elem`], the scalar component type
//! - **Bit intrinsics**: [`BitOps::popcount`] and [`BitOps::ffs`]
//!
//! Supported coordinate types are integer and float scalars (dimension 1),
//! arrays `[T; N]`, [`Vector`], and the 1-4 component builtin vector structs
//! in [`coord`].
//!
//! ```rust
//! use polyacc_core::{get_extent, set_extent, Vector};
//!
//! let mut extent = Vector::new([4usize, 8]);
//! assert_eq!(get_extent::<0, _>(&extent), 4);
//! assert_eq!(get_extent::<1, _>(&extent), 8);
//!
//! set_extent::<0, _>(&mut extent, 10);
//! assert_eq!(get_extent::<0, _>(&extent), 10);
//! ```
//!
//! An axis outside the dimension is rejected when the kernel is compiled:
//!
//! ```compile_fail
//! use polyacc_core::{get_extent, Vector};
//!
//! let extent = Vector::new([4usize, 8]);
//! let _ = get_extent::<2, _>(&extent);
//! ```

pub mod coord;
pub mod dim;
pub mod elem;
pub mod error;
pub mod extent;
pub mod idx;
pub mod intrinsic;
pub mod kind;
pub mod offset;
pub mod vec;

pub use coord::{Dim3, Vec1, Vec2, Vec3, Vec4};
pub use dim::{dim_of, Dimensioned, SizeOf, SizeType};
pub use elem::{ElemKind, ElemOf, ElemType, Element};
pub use error::{ConfigError, Result};
pub use extent::{checked_extent_product, extent_product, extents_of, get_extent, set_extent, try_extent, try_set_extent, Extent};
pub use idx::Idx;
pub use intrinsic::BitOps;
pub use kind::{Coord, CoordKind, Shape};
pub use offset::{get_offset, offsets_of, set_offset, try_offset, try_set_offset, Offset};
pub use vec::Vector;
