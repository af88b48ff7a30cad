//! Backend and kernel traits

mod traits;

pub use traits::{Backend, Kernel};
