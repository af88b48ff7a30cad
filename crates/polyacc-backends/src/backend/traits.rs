//! Kernel and backend traits
//!
//! A [`Kernel`] is written once against [`Acc`]; each [`Backend`] supplies
//! the device, barrier and shared-memory allocator that `Acc` resolves to.

use std::future::Future;

use crate::acc::Acc;
use crate::device::Device;
use crate::error::Result;
use crate::workdiv::{AccProps, WorkDiv};

/// Code executed by every lane of a launch.
///
/// Kernel arguments are the fields of the implementing type; accessors
/// borrow the buffers they touch for the duration of the launch.
///
/// `run` is a future so the same kernel can suspend at barriers on the
/// cooperative backend and block on the threaded ones.
///
/// # Example
///
/// ```rust
/// use polyacc_backends::{Acc, Accessor, Backend, Buffer, CpuDevice, CpuSerial, Kernel, ReadAccessor, Result, WorkDiv};
///
/// struct Scale<'a> {
///     input: ReadAccessor<'a, f32, 1>,
///     output: Accessor<'a, f32, 1>,
///     factor: f32,
/// }
///
/// impl Kernel<1> for Scale<'_> {
///     async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
///         for idx in acc.elem_indices() {
///             if idx[0] < self.input.extent()[0] {
///                 // SAFETY: every element index belongs to exactly one lane.
///                 unsafe { self.output.set(idx, self.input.get(idx) * self.factor) };
///             }
///         }
///         Ok(())
///     }
/// }
///
/// # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
/// let device = CpuDevice::new();
/// let mut input = Buffer::<f32, _, 1>::allocate(&device, [8])?;
/// input.copy_from_slice(&[1.5; 8])?;
/// let mut output = Buffer::<f32, _, 1>::allocate(&device, [8])?;
///
/// let backend = CpuSerial::new(device.clone());
/// let work_div = WorkDiv::for_extent(&backend.acc_props(), [8], [1])?;
/// backend.launch(
///     &work_div,
///     &Scale {
///         input: input.accessor(),
///         output: output.accessor_mut(),
///         factor: 2.0,
///     },
/// )?;
///
/// assert_eq!(output.to_vec(), vec![3.0; 8]);
/// # Ok(())
/// # }
/// ```
pub trait Kernel<const N: usize>: Sync {
    /// Body executed by one lane
    fn run<A: Acc<N>>(&self, acc: &A) -> impl Future<Output = Result<()>>;

    /// Block-shared bytes this kernel allocates per block under `work_div`.
    ///
    /// Launch fails with `CapacityError` before any lane runs when this
    /// exceeds the backend's limit; allocating beyond it inside the kernel
    /// fails the same way.
    fn block_shared_mem_bytes(&self, _work_div: &WorkDiv<N>) -> usize {
        0
    }

    /// Bytes of the dynamic block-shared area under `work_div`.
    ///
    /// Every lane of a block sees the same area through
    /// [`Acc::dyn_shared`]. It counts against the same per-block limit as
    /// [`Kernel::block_shared_mem_bytes`].
    fn dyn_shared_mem_bytes(&self, _work_div: &WorkDiv<N>) -> usize {
        0
    }
}

/// Launches kernels on one device.
///
/// # Execution Model
///
/// ```text
/// Grid (work_div.grid_block_extent):
///   ┌─────┬─────┬─────┐
///   │Block│Block│Block│  blocks run in any order, possibly in parallel
///   ├─────┼─────┼─────┤
///   │Block│Block│Block│
///   └─────┴─────┴─────┘
///
/// Block (work_div.block_thread_extent):
///   ┌────┬────┬────┐
///   │Lane│Lane│Lane│  lanes share a barrier and block-shared memory
///   ├────┼────┼────┤
///   │Lane│Lane│Lane│
///   └────┴────┴────┘
/// ```
///
/// A launch returns once every block has finished. Lane failures are
/// collected and the first one, in block then lane order, is returned.
pub trait Backend {
    type Device: Device;

    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Device this backend launches on
    fn device(&self) -> &Self::Device;

    /// Limits a work division must respect
    fn acc_props(&self) -> AccProps;

    // ============================================================================================
    // Kernel Execution
    // ============================================================================================

    /// Run `kernel` over `work_div`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidWorkDiv` when the division exceeds [`Backend::acc_props`]
    /// - `CapacityError` when the declared static plus dynamic shared memory
    ///   exceeds the limit
    /// - the first error returned by a lane, or `KernelPanicked` / `Deadlock`
    fn launch<const N: usize, K: Kernel<N>>(&self, work_div: &WorkDiv<N>, kernel: &K) -> Result<()>;
}
