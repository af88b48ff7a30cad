//! Block barriers seen from kernels on every backend

use polyacc_backends::mem::Accessor;
use polyacc_backends::{
    Acc, Backend, BackendError, BlockPredicate, Buffer, CpuDevice, CpuFibers, CpuSerial, CpuThreads, Kernel, Result,
    SimGpu, SimGpuDevice, WorkDiv,
};

const ROUNDS: u32 = 5;

/// Each round every lane writes its slot, then reads its right neighbour's
/// value from the same round. A lane that passes a barrier early reads a
/// stale value.
struct RingExchange<'a> {
    stale: Accessor<'a, u32, 1>,
}

impl Kernel<1> for RingExchange<'_> {
    async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
        let lanes = acc.work_div().block_thread_count();
        let lane = acc.block_thread_linear_idx();
        let ring = acc.alloc_shared::<u32>(lanes).await?;

        for round in 1..=ROUNDS {
            // SAFETY: own slot, previous readers are behind the second barrier.
            unsafe { ring.store(lane, round * 1000 + lane as u32) };
            acc.sync_block_threads().await;
            let right = (lane + 1) % lanes;
            // SAFETY: writers of this round are behind the first barrier.
            let seen = unsafe { ring.load(right) };
            if seen != round * 1000 + right as u32 {
                self.stale.atomic([0], polyacc_backends::AtomicOp::Add, 1)?;
            }
            acc.sync_block_threads().await;
        }
        Ok(())
    }

    fn block_shared_mem_bytes(&self, work_div: &WorkDiv<1>) -> usize {
        work_div.block_thread_count() * 4
    }
}

fn stale_reads_on<B: Backend>(backend: &B, blocks: usize, lanes: usize) -> u32 {
    let mut stale = Buffer::<u32, _, 1>::allocate(backend.device(), [1]).unwrap();
    let wd = WorkDiv::linear(blocks, lanes, 1).unwrap();
    backend.launch(&wd, &RingExchange { stale: stale.accessor_mut() }).unwrap();
    stale.to_vec()[0]
}

#[test]
fn test_barrier_orders_rounds() {
    let host = CpuDevice::new();
    assert_eq!(stale_reads_on(&CpuThreads::new(host.clone()), 3, 16), 0);
    assert_eq!(stale_reads_on(&CpuFibers::new(host), 3, 16), 0);
    assert_eq!(stale_reads_on(&SimGpu::new(SimGpuDevice::default()).unwrap(), 6, 32), 0);
}

/// Records `[count, and, or]` of the predicate `lane % 3 == 0` per block
struct Votes<'a> {
    out: Accessor<'a, u32, 2>,
}

impl Kernel<1> for Votes<'_> {
    async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
        let vote = acc.block_thread_linear_idx() % 3 == 0;
        let count = acc.sync_block_threads_predicate(BlockPredicate::Count, vote).await;
        let all = acc.sync_block_threads_predicate(BlockPredicate::And, vote).await;
        let any = acc.sync_block_threads_predicate(BlockPredicate::Or, vote).await;

        if acc.block_thread_linear_idx() == 0 {
            let block = acc.grid_block_linear_idx();
            for (slot, value) in [count, all, any].into_iter().enumerate() {
                // SAFETY: one writer per block row.
                unsafe { self.out.set([block, slot], value as u32) };
            }
        }
        Ok(())
    }
}

fn votes_on<B: Backend>(backend: &B, lanes: usize) -> Vec<u32> {
    let mut out = Buffer::<u32, _, 2>::allocate(backend.device(), [2, 3]).unwrap();
    let wd = WorkDiv::linear(2, lanes, 1).unwrap();
    backend.launch(&wd, &Votes { out: out.accessor_mut() }).unwrap();
    out.to_vec()
}

#[test]
fn test_predicate_votes() {
    let host = CpuDevice::new();
    // one lane: lane 0 votes yes
    assert_eq!(votes_on(&CpuSerial::new(host.clone()), 1), vec![1, 1, 1, 1, 1, 1]);
    // seven lanes: 0, 3 and 6 vote yes
    let seven = vec![3, 0, 1, 3, 0, 1];
    assert_eq!(votes_on(&CpuThreads::new(host.clone()), 7), seven);
    assert_eq!(votes_on(&CpuFibers::new(host), 7), seven);
    assert_eq!(votes_on(&SimGpu::new(SimGpuDevice::default()).unwrap(), 7), seven);
}

/// Lane 1 returns an error before the barrier the others wait on
struct QuitsEarly;

impl Kernel<1> for QuitsEarly {
    async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
        if acc.block_thread_linear_idx() == 1 {
            return Err(BackendError::execution_error("lane 1 quit"));
        }
        acc.sync_block_threads().await;
        Ok(())
    }
}

#[test]
fn test_lane_error_releases_waiting_lanes() {
    let host = CpuDevice::new();
    let wd = WorkDiv::linear(2, 4, 1).unwrap();

    let threads = CpuThreads::new(host.clone()).launch(&wd, &QuitsEarly).unwrap_err();
    assert!(matches!(threads, BackendError::ExecutionError(ref msg) if msg == "lane 1 quit"));

    let fibers = CpuFibers::new(host).launch(&wd, &QuitsEarly).unwrap_err();
    assert!(matches!(fibers, BackendError::ExecutionError(ref msg) if msg == "lane 1 quit"));
}

/// Lane 0 returns without reaching the barrier the other lanes wait on
struct SkipsBarrier;

impl Kernel<1> for SkipsBarrier {
    async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
        if acc.block_thread_linear_idx() != 0 {
            acc.sync_block_threads().await;
        }
        Ok(())
    }
}

fn assert_deadlock<B: Backend>(backend: &B) {
    let wd = WorkDiv::linear(2, 3, 1).unwrap();
    match backend.launch(&wd, &SkipsBarrier) {
        Err(BackendError::Deadlock { block, pending, lanes }) => {
            assert_eq!((block, pending, lanes), (0, 2, 3), "{}", backend.name());
        }
        other => panic!("{}: expected Deadlock, got {other:?}", backend.name()),
    }
}

#[test]
fn test_skipped_barrier_reported_on_every_multi_lane_backend() {
    let host = CpuDevice::new();
    assert_deadlock(&CpuThreads::new(host.clone()));
    assert_deadlock(&CpuFibers::new(host));
    assert_deadlock(&SimGpu::new(SimGpuDevice::default()).unwrap());
}
