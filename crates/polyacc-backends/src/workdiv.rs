//! Work division: how a launch splits its index space
//!
//! ```text
//! grid  = grid_block_extent   blocks
//! block = block_thread_extent threads (lanes) per block
//! elems = thread_elem_extent  elements handled by each thread
//!
//! covered extent = grid * block * elems   (per axis)
//! ```

use std::fmt;

use polyacc_core::{ConfigError, Vector};

/// Launch limits of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccProps {
    /// Blocks along any grid axis
    pub grid_block_extent_max: usize,
    /// Threads along any block axis
    pub block_thread_extent_max: usize,
    /// Threads in one block
    pub block_threads_max: usize,
    /// Elements along any thread axis
    pub thread_elem_extent_max: usize,
    /// Declared block-shared bytes per block, static and dynamic together
    pub shared_mem_bytes_max: usize,
    /// Lanes per warp
    pub warp_size: usize,
}

/// Grid, block and per-thread extents of one launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkDiv<const N: usize> {
    grid_block_extent: Vector<usize, N>,
    block_thread_extent: Vector<usize, N>,
    thread_elem_extent: Vector<usize, N>,
}

impl<const N: usize> WorkDiv<N> {
    /// Work division with every axis non-zero
    pub fn new(
        grid_block_extent: impl Into<Vector<usize, N>>,
        block_thread_extent: impl Into<Vector<usize, N>>,
        thread_elem_extent: impl Into<Vector<usize, N>>,
    ) -> Result<Self, ConfigError> {
        const { assert!(N >= 1, "work divisions need at least one axis") };

        let work_div = Self {
            grid_block_extent: grid_block_extent.into(),
            block_thread_extent: block_thread_extent.into(),
            thread_elem_extent: thread_elem_extent.into(),
        };
        for (name, extent) in [
            ("grid block", work_div.grid_block_extent),
            ("block thread", work_div.block_thread_extent),
            ("thread elem", work_div.thread_elem_extent),
        ] {
            if let Some(axis) = extent.iter().position(|&e| e == 0) {
                return Err(ConfigError::invalid_work_div(format!(
                    "{name} extent {extent} is zero on axis {axis}"
                )));
            }
        }
        Ok(work_div)
    }

    pub fn grid_block_extent(&self) -> Vector<usize, N> {
        self.grid_block_extent
    }

    pub fn block_thread_extent(&self) -> Vector<usize, N> {
        self.block_thread_extent
    }

    pub fn thread_elem_extent(&self) -> Vector<usize, N> {
        self.thread_elem_extent
    }

    /// Threads per grid axis
    pub fn grid_thread_extent(&self) -> Vector<usize, N> {
        self.grid_block_extent * self.block_thread_extent
    }

    /// Elements covered per grid axis
    pub fn grid_elem_extent(&self) -> Vector<usize, N> {
        self.grid_thread_extent() * self.thread_elem_extent
    }

    pub fn grid_block_count(&self) -> usize {
        self.grid_block_extent.prod()
    }

    pub fn block_thread_count(&self) -> usize {
        self.block_thread_extent.prod()
    }

    /// Check every extent against `props`
    pub fn validate(&self, props: &AccProps) -> Result<(), ConfigError> {
        let over = |what: &str, extent: Vector<usize, N>, max: usize| {
            ConfigError::invalid_work_div(format!("{what} extent {extent} exceeds {max} on some axis"))
        };

        if self.grid_block_extent.iter().any(|&e| e > props.grid_block_extent_max) {
            return Err(over("grid block", self.grid_block_extent, props.grid_block_extent_max));
        }
        if self.block_thread_extent.iter().any(|&e| e > props.block_thread_extent_max) {
            return Err(over("block thread", self.block_thread_extent, props.block_thread_extent_max));
        }
        if self.thread_elem_extent.iter().any(|&e| e > props.thread_elem_extent_max) {
            return Err(over("thread elem", self.thread_elem_extent, props.thread_elem_extent_max));
        }

        match self.block_thread_extent.checked_prod() {
            Some(threads) if threads <= props.block_threads_max => {}
            _ => {
                return Err(ConfigError::invalid_work_div(format!(
                    "block of {} threads exceeds {} threads per block",
                    self.block_thread_extent, props.block_threads_max
                )))
            }
        }
        if self.grid_block_extent.checked_prod().is_none() || self.grid_elem_extent_checked().is_none() {
            return Err(ConfigError::invalid_work_div(format!("{self} overflows usize")));
        }
        Ok(())
    }

    fn grid_elem_extent_checked(&self) -> Option<Vector<usize, N>> {
        let mut out = [0usize; N];
        for (axis, dst) in out.iter_mut().enumerate() {
            *dst = self.grid_block_extent[axis]
                .checked_mul(self.block_thread_extent[axis])?
                .checked_mul(self.thread_elem_extent[axis])?;
        }
        Some(Vector::new(out))
    }

    /// Smallest valid division covering `extent` with `thread_elems` per thread.
    ///
    /// Threads are assigned to the fastest axis first, clamped to the
    /// per-axis and per-block limits; blocks then cover the remainder.
    pub fn for_extent(
        props: &AccProps,
        extent: impl Into<Vector<usize, N>>,
        thread_elems: impl Into<Vector<usize, N>>,
    ) -> Result<Self, ConfigError> {
        let extent = extent.into();
        let thread_elems = thread_elems.into();
        if let Some(axis) = extent.iter().position(|&e| e == 0) {
            return Err(ConfigError::ZeroExtent { axis });
        }
        if thread_elems.iter().any(|&e| e == 0) {
            return Err(ConfigError::invalid_work_div(format!(
                "thread elem extent {thread_elems} has a zero axis"
            )));
        }

        let overflow = || ConfigError::invalid_work_div(format!("extent {extent} overflows usize"));
        let threads_needed = extent.checked_div_ceil(thread_elems).ok_or_else(overflow)?;
        let mut block = Vector::all(1usize);
        let mut budget = props.block_threads_max.max(1);
        for axis in (0..N).rev() {
            let threads = threads_needed[axis]
                .min(props.block_thread_extent_max.max(1))
                .min(budget);
            block[axis] = threads;
            budget /= threads;
        }
        let grid = threads_needed.checked_div_ceil(block).ok_or_else(overflow)?;

        let work_div = Self::new(grid, block, thread_elems)?;
        work_div.validate(props)?;
        Ok(work_div)
    }
}

impl WorkDiv<1> {
    /// One-dimensional division
    pub fn linear(grid_blocks: usize, block_threads: usize, thread_elems: usize) -> Result<Self, ConfigError> {
        Self::new([grid_blocks], [block_threads], [thread_elems])
    }
}

impl<const N: usize> fmt::Display for WorkDiv<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grid {} x block {} x elems {}",
            self.grid_block_extent, self.block_thread_extent, self.thread_elem_extent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn props(block_threads_max: usize) -> AccProps {
        AccProps {
            grid_block_extent_max: usize::MAX,
            block_thread_extent_max: block_threads_max,
            block_threads_max,
            thread_elem_extent_max: usize::MAX,
            shared_mem_bytes_max: 1024,
            warp_size: 1,
        }
    }

    #[test]
    fn test_counts() {
        let wd = WorkDiv::new([2, 3], [4, 8], [1, 2]).unwrap();
        assert_eq!(wd.grid_block_count(), 6);
        assert_eq!(wd.block_thread_count(), 32);
        assert_eq!(wd.grid_thread_extent(), Vector::new([8, 24]));
        assert_eq!(wd.grid_elem_extent(), Vector::new([8, 48]));
        assert_eq!(wd.to_string(), "grid (2, 3) x block (4, 8) x elems (1, 2)");
    }

    #[test]
    fn test_zero_axis_rejected() {
        assert!(matches!(
            WorkDiv::new([1, 0], [1, 1], [1, 1]),
            Err(ConfigError::InvalidWorkDiv(_))
        ));
    }

    #[test]
    fn test_validate_limits() {
        let wd = WorkDiv::linear(4, 64, 1).unwrap();
        assert!(wd.validate(&props(64)).is_ok());
        assert!(matches!(wd.validate(&props(32)), Err(ConfigError::InvalidWorkDiv(_))));

        let square = WorkDiv::new([1, 1], [16, 16], [1, 1]).unwrap();
        let per_axis_ok = AccProps {
            block_thread_extent_max: 16,
            ..props(256)
        };
        assert!(square.validate(&per_axis_ok).is_ok());
        assert!(square.validate(&props(128)).is_err());
    }

    #[test]
    fn test_for_extent_covers_extent() {
        let wd = WorkDiv::for_extent(&props(256), [100, 1000], [1, 4]).unwrap();
        assert!(wd.block_thread_count() <= 256);
        let covered = wd.grid_elem_extent();
        assert!(covered[0] >= 100 && covered[1] >= 1000);
        assert_eq!(wd.block_thread_extent(), Vector::new([1, 250]));
        assert_eq!(wd.grid_block_extent(), Vector::new([100, 1]));
    }

    #[test]
    fn test_for_extent_single_thread_blocks() {
        let wd = WorkDiv::for_extent(&props(1), [7], [2]).unwrap();
        assert_eq!(wd.block_thread_extent(), Vector::new([1]));
        assert_eq!(wd.grid_block_extent(), Vector::new([4]));
    }

    #[test]
    fn test_for_extent_zero() {
        assert_eq!(
            WorkDiv::for_extent(&props(8), [4, 0], [1, 1]),
            Err(ConfigError::ZeroExtent { axis: 1 })
        );
    }

    #[test]
    fn test_for_extent_at_usize_max() {
        let wd = WorkDiv::<1>::for_extent(&props(1), [usize::MAX], [1]).unwrap();
        assert_eq!(wd.grid_block_extent(), Vector::new([usize::MAX]));

        // 256-thread blocks round the grid past usize::MAX elements
        assert!(matches!(
            WorkDiv::<1>::for_extent(&props(256), [usize::MAX], [1]),
            Err(ConfigError::InvalidWorkDiv(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_for_extent_never_panics(
            e0 in 1usize.., e1 in 1usize.., t0 in 1usize.., t1 in 1usize.., max in 1usize..2048,
        ) {
            let limits = props(max);
            if let Ok(wd) = WorkDiv::for_extent(&limits, [e0, e1], [t0, t1]) {
                prop_assert!(wd.validate(&limits).is_ok());
                let covered = wd.grid_elem_extent();
                prop_assert!(covered[0] >= e0 && covered[1] >= e1);
            }
        }
    }
}
