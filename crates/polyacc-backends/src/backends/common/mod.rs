//! Launch machinery shared by the backends
//!
//! - `launch` - validation, launch records, single-lane blocks
//! - `group` - one OS thread per lane with a poisonable barrier
//! - `fiber` - cooperative lanes on one thread with deadlock detection

pub(crate) mod fiber;
pub(crate) mod group;
pub(crate) mod launch;

pub(crate) use fiber::run_fibers;
pub(crate) use group::run_thread_group;
pub(crate) use launch::{block_index, run_single_lane, Launch};
