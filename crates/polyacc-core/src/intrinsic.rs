//! Bit intrinsics available to every kernel

use num_traits::PrimInt;

/// Integer types with bit-counting intrinsics
pub trait BitOps: PrimInt {
    /// Number of set bits
    fn popcount(self) -> u32 {
        self.count_ones()
    }

    /// 1-based index of the lowest set bit, 0 when no bit is set
    fn ffs(self) -> u32 {
        if self.is_zero() {
            0
        } else {
            self.trailing_zeros() + 1
        }
    }
}

impl BitOps for u32 {}
impl BitOps for u64 {}
impl BitOps for i32 {}
impl BitOps for i64 {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_popcount() {
        assert_eq!(0u32.popcount(), 0);
        assert_eq!(0b1011u64.popcount(), 3);
        assert_eq!((-1i32).popcount(), 32);
        assert_eq!(i64::MIN.popcount(), 1);
    }

    #[test]
    fn test_ffs() {
        assert_eq!(0u32.ffs(), 0);
        assert_eq!(1u32.ffs(), 1);
        assert_eq!(0b1000u64.ffs(), 4);
        assert_eq!(i32::MIN.ffs(), 32);
        assert_eq!((-1i64).ffs(), 1);
    }

    proptest! {
        #[test]
        fn prop_ffs_marks_lowest_set_bit(x in 1u64..) {
            let bit = x.ffs();
            prop_assert!((1..=64).contains(&bit));
            prop_assert_eq!(x & ((1u64 << (bit - 1)) - 1), 0);
            prop_assert_ne!(x & (1u64 << (bit - 1)), 0);
        }
    }
}
