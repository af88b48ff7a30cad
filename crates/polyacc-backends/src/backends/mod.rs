//! Backend implementations
//!
//! - `cpu` - host backends: serial, rayon blocks, OS threads, fibers
//! - `sim_gpu` - simulated accelerator with its own memory space
//! - `common` - launch validation and block runners shared by all of them

mod common;
pub mod cpu;
pub mod sim_gpu;

pub use cpu::{CpuBlocks, CpuFibers, CpuSerial, CpuThreads};
pub use sim_gpu::SimGpu;

pub(crate) use common::launch::panic_message;
