//! Block-level facilities: lane identity, barriers, shared memory

pub mod lane;
pub mod shared;
pub mod sync;

pub use lane::{current_lane, is_master_lane};
pub use shared::{BuiltInSharedAlloc, MasterSyncSharedAlloc, NoSyncSharedAlloc, SharedAlloc, SharedSlice};
pub use sync::{BlockPredicate, BlockReduce, BlockSync, FiberBarrier, NoOpSync, ThreadBarrier};
