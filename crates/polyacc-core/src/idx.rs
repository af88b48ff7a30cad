//! Integer index and size arithmetic

use num_traits::{NumCast, PrimInt};
use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::error::{ConfigError, Result};

/// Integer type used for index and size arithmetic.
///
/// Every extent, offset and linear index in a kernel is computed in one of
/// these types. Narrow types are allowed; conversions to and from `usize` are
/// checked.
pub trait Idx: PrimInt + Default + Hash + Debug + Display + Send + Sync + 'static {
    /// Name of the integer type, used in diagnostics
    const NAME: &'static str;

    /// Convert to `usize`, failing for negative or oversized values
    fn to_usize_checked(self) -> Result<usize> {
        NumCast::from(self).ok_or_else(|| ConfigError::IndexOverflow {
            value: self.to_i128().unwrap_or(i128::MAX),
            index_type: "usize",
        })
    }

    /// Convert from `usize`, failing if the value does not fit
    fn from_usize_checked(value: usize) -> Result<Self> {
        NumCast::from(value).ok_or(ConfigError::IndexOverflow {
            value: value as i128,
            index_type: Self::NAME,
        })
    }
}

macro_rules! impl_idx {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Idx for $ty {
                const NAME: &'static str = stringify!($ty);
            }
        )*
    };
}

impl_idx!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_conversions() {
        assert_eq!(42u16.to_usize_checked().unwrap(), 42);
        assert_eq!(u8::from_usize_checked(255).unwrap(), 255);
        assert!(u8::from_usize_checked(256).is_err());
        assert!((-1i32).to_usize_checked().is_err());
    }

    #[test]
    fn test_negative_index_keeps_its_value() {
        assert_eq!(
            (-7i64).to_usize_checked(),
            Err(ConfigError::IndexOverflow {
                value: -7,
                index_type: "usize"
            })
        );
        let err = i8::MIN.to_usize_checked().unwrap_err();
        assert_eq!(err.to_string(), "value -128 does not fit into index type usize");
    }

    #[test]
    fn test_overflow_names_target_type() {
        let err = u16::from_usize_checked(70_000).unwrap_err();
        assert_eq!(
            err,
            ConfigError::IndexOverflow {
                value: 70_000,
                index_type: "u16"
            }
        );
    }
}
