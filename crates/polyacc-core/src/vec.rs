//! N-dimensional value vector
//!
//! [`Vector`] is the common currency for extents, offsets and indices. Axis 0
//! is the slowest varying axis and axis `N - 1` the fastest, so linearization
//! is row-major:
//!
//! ```text
//! extent (4, 8)       index (1, 3)
//!
//!   axis 1 ──►         linear = 1 * 8 + 3 = 11
//!  ┌────────────┐
//!  │ 0  1 .. 7  │ axis 0
//!  │ 8  9 .. 15 │   │
//!  │ ...        │   ▼
//!  └────────────┘
//! ```

use num_traits::{NumCast, PrimInt};
use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul, Sub};

/// Fixed-size N-dimensional vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Vector<T, const N: usize>(pub [T; N]);

impl<T, const N: usize> Vector<T, N> {
    /// Create a vector from its components
    pub const fn new(components: [T; N]) -> Self {
        Self(components)
    }

    /// Create a vector by evaluating `f` for every axis
    pub fn from_fn(f: impl FnMut(usize) -> T) -> Self {
        Self(std::array::from_fn(f))
    }

    /// Number of components
    pub const fn dim(&self) -> usize {
        N
    }

    /// Components as a fixed-size array
    pub const fn as_array(&self) -> &[T; N] {
        &self.0
    }

    /// Consume the vector and return its components
    pub fn into_array(self) -> [T; N] {
        self.0
    }

    /// Iterate over the components from axis 0 to axis `N - 1`
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Apply `f` to every component
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Vector<U, N> {
        Vector(self.0.map(f))
    }
}

impl<T: Copy, const N: usize> Vector<T, N> {
    /// Vector with every component set to `value`
    pub fn all(value: T) -> Self {
        Self([value; N])
    }

    /// Combine two vectors component by component
    pub fn zip_with<U: Copy, R>(self, other: Vector<U, N>, mut f: impl FnMut(T, U) -> R) -> Vector<R, N> {
        Vector::from_fn(|axis| f(self.0[axis], other.0[axis]))
    }

    /// Components in reverse axis order
    pub fn reversed(self) -> Self {
        let mut out = self;
        out.0.reverse();
        out
    }

    /// The first `M` components
    pub fn sub_vec_begin<const M: usize>(self) -> Vector<T, M> {
        const { assert!(M <= N, "sub-vector longer than vector") };
        Vector::from_fn(|axis| self.0[axis])
    }

    /// The last `M` components
    pub fn sub_vec_end<const M: usize>(self) -> Vector<T, M> {
        const { assert!(M <= N, "sub-vector longer than vector") };
        Vector::from_fn(|axis| self.0[N - M + axis])
    }
}

impl<T: PrimInt, const N: usize> Vector<T, N> {
    /// Vector of zeros
    pub fn zeros() -> Self {
        Self::all(T::zero())
    }

    /// Vector of ones
    pub fn ones() -> Self {
        Self::all(T::one())
    }

    /// Product of all components; 1 for `N == 0`
    ///
    /// # Panics
    ///
    /// Panics on overflow in debug builds. Use [`Vector::checked_prod`] for
    /// untrusted extents.
    pub fn prod(&self) -> T {
        self.0.iter().fold(T::one(), |acc, &v| acc * v)
    }

    /// Product of all components, `None` on overflow
    pub fn checked_prod(&self) -> Option<T> {
        self.0.iter().try_fold(T::one(), |acc, &v| acc.checked_mul(&v))
    }

    /// Sum of all components
    ///
    /// # Panics
    ///
    /// Panics on overflow in debug builds.
    pub fn sum(&self) -> T {
        self.0.iter().fold(T::zero(), |acc, &v| acc + v)
    }

    /// Smallest component
    pub fn min_elem(&self) -> Option<T> {
        self.0.iter().copied().min()
    }

    /// Largest component
    pub fn max_elem(&self) -> Option<T> {
        self.0.iter().copied().max()
    }

    /// Component-wise ceiling division for non-negative components.
    ///
    /// Never overflows, `usize::MAX` divided by 2 rounds up to `usize::MAX / 2 + 1`.
    ///
    /// # Panics
    ///
    /// Panics if any divisor component is zero.
    pub fn div_ceil(self, divisor: Self) -> Self {
        self.zip_with(divisor, ceil_div)
    }

    /// Component-wise ceiling division, `None` if any divisor component is zero
    pub fn checked_div_ceil(self, divisor: Self) -> Option<Self> {
        if divisor.iter().any(|d| d.is_zero()) {
            return None;
        }
        Some(self.div_ceil(divisor))
    }

    /// Convert every component, `None` if any component does not fit
    pub fn cast<U: PrimInt>(self) -> Option<Vector<U, N>> {
        let mut out = [U::zero(); N];
        for (dst, src) in out.iter_mut().zip(self.0) {
            *dst = <U as NumCast>::from(src)?;
        }
        Some(Vector(out))
    }

    /// Check that `self` lies inside `extent` on every axis
    pub fn is_within(&self, extent: &Self) -> bool {
        self.0.iter().zip(extent.0.iter()).all(|(i, e)| i < e)
    }

    /// Row-major linear index of `self` inside `extent`
    ///
    /// # Panics
    ///
    /// Panics on overflow in debug builds if `self` lies far outside `extent`.
    pub fn linearize(&self, extent: &Self) -> T {
        self.0
            .iter()
            .zip(extent.0.iter())
            .fold(T::zero(), |acc, (&i, &e)| acc * e + i)
    }

    /// Inverse of [`Vector::linearize`].
    ///
    /// An extent with a zero axis holds no index; the result is then the
    /// zero vector. Linear indices past the end wrap into axis 0.
    pub fn delinearize(mut linear: T, extent: &Self) -> Self {
        let mut out = Self::zeros();
        if extent.iter().any(|e| e.is_zero()) {
            return out;
        }
        for axis in (0..N).rev() {
            let e = extent.0[axis];
            out.0[axis] = linear % e;
            linear = linear / e;
        }
        out
    }
}

fn ceil_div<T: PrimInt>(a: T, b: T) -> T {
    let q = a / b;
    if (a % b).is_zero() {
        q
    } else {
        q + T::one()
    }
}

impl<T: Default + Copy, const N: usize> Default for Vector<T, N> {
    fn default() -> Self {
        Self([T::default(); N])
    }
}

impl<T, const N: usize> From<[T; N]> for Vector<T, N> {
    fn from(components: [T; N]) -> Self {
        Self(components)
    }
}

impl<T, const N: usize> From<Vector<T, N>> for [T; N] {
    fn from(v: Vector<T, N>) -> Self {
        v.0
    }
}

impl<T, const N: usize> Index<usize> for Vector<T, N> {
    type Output = T;

    fn index(&self, axis: usize) -> &T {
        &self.0[axis]
    }
}

impl<T, const N: usize> IndexMut<usize> for Vector<T, N> {
    fn index_mut(&mut self, axis: usize) -> &mut T {
        &mut self.0[axis]
    }
}

macro_rules! impl_componentwise_op {
    ($trait:ident, $method:ident) => {
        impl<T: Copy + $trait<Output = T>, const N: usize> $trait for Vector<T, N> {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self {
                self.zip_with(rhs, |a, b| a.$method(b))
            }
        }
    };
}

impl_componentwise_op!(Add, add);
impl_componentwise_op!(Sub, sub);
impl_componentwise_op!(Mul, mul);

impl<T: fmt::Display, const N: usize> fmt::Display for Vector<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (axis, v) in self.0.iter().enumerate() {
            if axis > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

// ================================================================================================
// Tests
// ================================================================================================
