//! Atomic read-modify-write operations
//!
//! Every operation returns the value stored before it was applied. `Inc` and
//! `Dec` wrap against the operand the way accelerator atomics do:
//!
//! - `Inc`: `old >= operand ? 0 : old + 1`
//! - `Dec`: `old == 0 || old > operand ? operand : old - 1`
//!
//! Atomics are reached through [`Accessor`](crate::mem::Accessor) and
//! [`SharedSlice`](crate::block::SharedSlice); both check bounds first.

use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

use polyacc_core::Element;

/// Read-modify-write operation applied by an atomic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    Add,
    Sub,
    Min,
    Max,
    Exch,
    Inc,
    Dec,
    And,
    Or,
    Xor,
}

impl AtomicOp {
    pub const ALL: [AtomicOp; 10] = [
        AtomicOp::Add,
        AtomicOp::Sub,
        AtomicOp::Min,
        AtomicOp::Max,
        AtomicOp::Exch,
        AtomicOp::Inc,
        AtomicOp::Dec,
        AtomicOp::And,
        AtomicOp::Or,
        AtomicOp::Xor,
    ];
}

/// Elements with native atomic support.
///
/// The raw-pointer functions are implementation details of the memory views.
pub trait AtomicElement: Element {
    /// Apply `op` at `ptr` and return the previous value.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid and aligned to `size_of::<Self>()` for the duration
    /// of the call, and every concurrent access to it must be atomic.
    #[doc(hidden)]
    unsafe fn atomic_rmw(ptr: *mut Self, op: AtomicOp, operand: Self) -> Self;

    /// Store `new` if the current value equals `current`; return the
    /// previous value either way.
    ///
    /// # Safety
    ///
    /// Same contract as [`AtomicElement::atomic_rmw`].
    #[doc(hidden)]
    unsafe fn atomic_cas(ptr: *mut Self, current: Self, new: Self) -> Self;
}

macro_rules! impl_atomic_element {
    ($($ty:ty => $atomic:ty),* $(,)?) => {
        $(
            impl AtomicElement for $ty {
                unsafe fn atomic_rmw(ptr: *mut Self, op: AtomicOp, operand: Self) -> Self {
                    // SAFETY: forwarded from the caller.
                    let cell = unsafe { <$atomic>::from_ptr(ptr) };
                    let order = Ordering::SeqCst;
                    match op {
                        AtomicOp::Add => cell.fetch_add(operand, order),
                        AtomicOp::Sub => cell.fetch_sub(operand, order),
                        AtomicOp::Min => cell.fetch_min(operand, order),
                        AtomicOp::Max => cell.fetch_max(operand, order),
                        AtomicOp::Exch => cell.swap(operand, order),
                        AtomicOp::And => cell.fetch_and(operand, order),
                        AtomicOp::Or => cell.fetch_or(operand, order),
                        AtomicOp::Xor => cell.fetch_xor(operand, order),
                        AtomicOp::Inc => cell
                            .fetch_update(order, order, |old| {
                                Some(if old >= operand { 0 } else { old + 1 })
                            })
                            .unwrap_or_else(|old| old),
                        AtomicOp::Dec => cell
                            .fetch_update(order, order, |old| {
                                Some(if old == 0 || old > operand { operand } else { old - 1 })
                            })
                            .unwrap_or_else(|old| old),
                    }
                }

                unsafe fn atomic_cas(ptr: *mut Self, current: Self, new: Self) -> Self {
                    // SAFETY: forwarded from the caller.
                    let cell = unsafe { <$atomic>::from_ptr(ptr) };
                    match cell.compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst) {
                        Ok(prev) | Err(prev) => prev,
                    }
                }
            }
        )*
    };
}

impl_atomic_element!(u32 => AtomicU32, i32 => AtomicI32, u64 => AtomicU64, i64 => AtomicI64);

#[cfg(test)]
mod tests {
    use super::*;

    fn apply<T: AtomicElement>(start: T, op: AtomicOp, operand: T) -> (T, T) {
        let mut cell = start;
        // SAFETY: exclusive local.
        let prev = unsafe { T::atomic_rmw(&mut cell, op, operand) };
        (prev, cell)
    }

    #[test]
    fn test_arithmetic_ops_return_previous() {
        assert_eq!(apply(5u32, AtomicOp::Add, 3), (5, 8));
        assert_eq!(apply(5i32, AtomicOp::Sub, 7), (5, -2));
        assert_eq!(apply(5u64, AtomicOp::Min, 2), (5, 2));
        assert_eq!(apply(5i64, AtomicOp::Max, 9), (5, 9));
        assert_eq!(apply(5u32, AtomicOp::Exch, 1), (5, 1));
    }

    #[test]
    fn test_bitwise_ops() {
        assert_eq!(apply(0b1100u32, AtomicOp::And, 0b1010), (0b1100, 0b1000));
        assert_eq!(apply(0b1100u32, AtomicOp::Or, 0b1010), (0b1100, 0b1110));
        assert_eq!(apply(0b1100u32, AtomicOp::Xor, 0b1010), (0b1100, 0b0110));
    }

    #[test]
    fn test_inc_dec_wrap() {
        assert_eq!(apply(3u32, AtomicOp::Inc, 5), (3, 4));
        assert_eq!(apply(5u32, AtomicOp::Inc, 5), (5, 0));
        assert_eq!(apply(3u32, AtomicOp::Dec, 5), (3, 2));
        assert_eq!(apply(0u32, AtomicOp::Dec, 5), (0, 5));
        assert_eq!(apply(9u32, AtomicOp::Dec, 5), (9, 5));
    }

    #[test]
    fn test_compare_exchange() {
        let mut cell = 7u64;
        // SAFETY: exclusive local.
        unsafe {
            assert_eq!(u64::atomic_cas(&mut cell, 1, 2), 7);
            assert_eq!(cell, 7);
            assert_eq!(u64::atomic_cas(&mut cell, 7, 2), 7);
        }
        assert_eq!(cell, 2);
    }

    #[test]
    fn test_concurrent_add() {
        let mut total = 0u64;
        let ptr = SendPtr(&mut total);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let ptr = ptr;
                    for _ in 0..1000 {
                        // SAFETY: all accesses during the scope are atomic.
                        unsafe { u64::atomic_rmw(ptr.0, AtomicOp::Add, 1) };
                    }
                });
            }
        });
        assert_eq!(total, 8000);
    }

    #[derive(Clone, Copy)]
    struct SendPtr(*mut u64);
    unsafe impl Send for SendPtr {}
    unsafe impl Sync for SendPtr {}
}
