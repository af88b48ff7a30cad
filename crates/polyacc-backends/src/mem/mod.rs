//! Device memory: buffers, views, accessors and explicit copies
//!
//! ```text
//! Buffer ─┬─ view()        ──► View      (mutable, reborrow)
//!         ├─ const_view()  ──► ConstView (read-only, Clone)
//!         ├─ accessor()    ──► ReadAccessor ─┐
//!         └─ accessor_mut()──► Accessor    ──┴─► kernels
//!
//! copy(&mut dst, &src)      any MemWrite <- any MemRead, row by row
//! ```

mod accessor;
mod buffer;
pub mod copy;
mod layout;
pub(crate) mod raw;
mod view;

pub use accessor::{Accessor, ReadAccessor};
pub use buffer::Buffer;
pub use copy::{copy, copy_from_slice, copy_to_vec, fill, MemRead, MemWrite};
pub use layout::PitchedLayout;
pub use view::{ConstView, View};
