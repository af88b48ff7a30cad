//! Barrier for lanes that run as OS threads

use std::future::Future;

use parking_lot::{Condvar, Mutex};

use super::{BlockPredicate, BlockReduce, BlockSync};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    poisoned: bool,
    finished: usize,
    stranded: Option<usize>,
    acc: u64,
    result: u64,
}

impl BarrierState {
    /// A finished lane never arrives again, so lanes already waiting in this
    /// generation can never be released.
    fn strand_if_unreachable(&mut self, size: usize) -> bool {
        if self.poisoned || self.finished == 0 || self.arrived == 0 {
            return false;
        }
        self.stranded = Some(size - self.finished);
        self.poisoned = true;
        true
    }
}

/// Reusable barrier for `size` threads.
///
/// When a lane fails, the launcher poisons the barrier so the remaining lanes
/// are released instead of waiting forever; a poisoned wait returns at once.
/// Lanes that return normally are reported through [`ThreadBarrier::lane_finished`];
/// once a waiting lane can no longer be joined by every peer the barrier
/// poisons itself and records the lanes left unfinished in
/// [`ThreadBarrier::stranded`].
#[derive(Debug)]
pub struct ThreadBarrier {
    size: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl ThreadBarrier {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                poisoned: false,
                finished: 0,
                stranded: None,
                acc: 0,
                result: 0,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Block until all lanes arrive; `false` if the barrier was poisoned
    pub fn arrive_and_wait(&self) -> bool {
        self.arrive(None).is_some()
    }

    /// Block until all lanes arrive and return the reduction of their
    /// predicates; `None` if the barrier was poisoned
    pub fn arrive_and_reduce(&self, op: BlockPredicate, predicate: bool) -> Option<usize> {
        self.arrive(Some(op.fold(predicate))).map(|reduced| reduced as usize)
    }

    /// Block until all lanes arrive and return `op` folded over their
    /// values; `None` if the barrier was poisoned
    pub fn arrive_and_fold(&self, op: BlockReduce, value: u64) -> Option<u64> {
        self.arrive(Some((op, value)))
    }

    /// Release every waiter and make later waits return immediately
    pub fn poison(&self) {
        let mut state = self.state.lock();
        state.poisoned = true;
        self.cvar.notify_all();
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.lock().poisoned
    }

    /// Record that a lane returned without failing
    pub fn lane_finished(&self) {
        let mut state = self.state.lock();
        state.finished += 1;
        if state.strand_if_unreachable(self.size) {
            tracing::debug!(pending = state.stranded, lanes = self.size, "barrier_stranded");
            self.cvar.notify_all();
        }
    }

    /// Lanes still unfinished when a barrier became unreachable, if it did
    pub fn stranded(&self) -> Option<usize> {
        self.state.lock().stranded
    }

    fn arrive(&self, contribution: Option<(BlockReduce, u64)>) -> Option<u64> {
        let mut state = self.state.lock();
        if state.poisoned {
            return None;
        }

        if let Some((op, value)) = contribution {
            let acc = if state.arrived == 0 { op.identity() } else { state.acc };
            state.acc = op.combine(acc, value);
        }
        state.arrived += 1;

        if state.arrived == self.size {
            state.result = state.acc;
            state.acc = 0;
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Some(state.result);
        }

        if state.strand_if_unreachable(self.size) {
            tracing::debug!(pending = state.stranded, lanes = self.size, "barrier_stranded");
            self.cvar.notify_all();
            return None;
        }

        let generation = state.generation;
        while state.generation == generation && !state.poisoned {
            self.cvar.wait(&mut state);
        }

        // result stays valid until this lane arrives at the next generation
        (state.generation != generation).then_some(state.result)
    }
}

impl BlockSync for ThreadBarrier {
    fn group_size(&self) -> usize {
        self.size
    }

    fn sync(&self) -> impl Future<Output = ()> {
        async move {
            self.arrive_and_wait();
        }
    }

    fn sync_reduce(&self, op: BlockReduce, value: u64) -> impl Future<Output = u64> {
        async move { self.arrive_and_fold(op, value).unwrap_or(0) }
    }
}
