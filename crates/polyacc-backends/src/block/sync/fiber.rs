//! Barrier for lanes that run as cooperatively scheduled futures
//!
//! All fibers of a block live on one OS thread. Arriving at the barrier
//! returns `Pending` until the last fiber arrives and bumps the generation.
//! The scheduler re-polls every pending fiber each round, so no waker is
//! registered.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::{BlockReduce, BlockSync};

/// Single-threaded reusable barrier for `size` fibers
#[derive(Debug)]
pub struct FiberBarrier {
    size: usize,
    arrived: Cell<usize>,
    generation: Cell<u64>,
    acc: Cell<u64>,
    result: Cell<u64>,
    arrivals: Cell<u64>,
}

impl FiberBarrier {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            arrived: Cell::new(0),
            generation: Cell::new(0),
            acc: Cell::new(0),
            result: Cell::new(0),
            arrivals: Cell::new(0),
        }
    }

    /// Total arrivals so far; the scheduler uses it to detect progress
    pub fn arrivals(&self) -> u64 {
        self.arrivals.get()
    }

    /// Fibers currently waiting in the open generation
    pub fn waiting(&self) -> usize {
        self.arrived.get()
    }

    /// Register one arrival; returns the generation it belongs to
    fn arrive(&self, contribution: Option<(BlockReduce, u64)>) -> u64 {
        let generation = self.generation.get();
        self.arrivals.set(self.arrivals.get() + 1);

        if let Some((op, value)) = contribution {
            let acc = if self.arrived.get() == 0 { op.identity() } else { self.acc.get() };
            self.acc.set(op.combine(acc, value));
        }

        let arrived = self.arrived.get() + 1;
        if arrived == self.size {
            self.result.set(self.acc.get());
            self.acc.set(0);
            self.arrived.set(0);
            self.generation.set(generation.wrapping_add(1));
        } else {
            self.arrived.set(arrived);
        }
        generation
    }

    fn arrival(&self, contribution: Option<(BlockReduce, u64)>) -> FiberArrival<'_> {
        FiberArrival {
            barrier: self,
            contribution,
            waiting_on: None,
        }
    }
}

/// Future of one fiber's pass through the barrier
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
struct FiberArrival<'a> {
    barrier: &'a FiberBarrier,
    contribution: Option<(BlockReduce, u64)>,
    waiting_on: Option<u64>,
}

impl Future for FiberArrival<'_> {
    type Output = u64;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<u64> {
        let this = self.get_mut();
        let generation = match this.waiting_on {
            Some(generation) => generation,
            None => {
                let generation = this.barrier.arrive(this.contribution);
                this.waiting_on = Some(generation);
                generation
            }
        };

        if this.barrier.generation.get() != generation {
            Poll::Ready(this.barrier.result.get())
        } else {
            Poll::Pending
        }
    }
}

impl BlockSync for FiberBarrier {
    fn group_size(&self) -> usize {
        self.size
    }

    fn sync(&self) -> impl Future<Output = ()> {
        let arrival = self.arrival(None);
        async move {
            arrival.await;
        }
    }

    fn sync_reduce(&self, op: BlockReduce, value: u64) -> impl Future<Output = u64> {
        self.arrival(Some((op, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::sync::BlockPredicate;
    use futures::task::noop_waker;

    fn poll_once<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        Pin::new(fut).poll(&mut cx)
    }

    #[test]
    fn test_last_arrival_releases_group() {
        let barrier = FiberBarrier::new(3);
        let mut a = barrier.arrival(Some(BlockPredicate::Count.fold(true)));
        let mut b = barrier.arrival(Some(BlockPredicate::Count.fold(false)));
        let mut c = barrier.arrival(Some(BlockPredicate::Count.fold(true)));

        assert!(poll_once(&mut a).is_pending());
        assert!(poll_once(&mut b).is_pending());
        assert_eq!(barrier.waiting(), 2);
        assert_eq!(poll_once(&mut c), Poll::Ready(2));
        assert_eq!(poll_once(&mut a), Poll::Ready(2));
        assert_eq!(poll_once(&mut b), Poll::Ready(2));
        assert_eq!(barrier.arrivals(), 3);
        assert_eq!(barrier.waiting(), 0);
    }

    #[test]
    fn test_repolling_does_not_rearrive() {
        let barrier = FiberBarrier::new(2);
        let mut a = barrier.arrival(None);
        assert!(poll_once(&mut a).is_pending());
        assert!(poll_once(&mut a).is_pending());
        assert_eq!(barrier.arrivals(), 1);
    }

    #[test]
    fn test_and_or_reductions() {
        let barrier = FiberBarrier::new(2);
        let mut a = barrier.arrival(Some(BlockPredicate::And.fold(true)));
        let mut b = barrier.arrival(Some(BlockPredicate::And.fold(false)));
        assert!(poll_once(&mut a).is_pending());
        assert_eq!(poll_once(&mut b), Poll::Ready(0));

        let mut a = barrier.arrival(Some(BlockPredicate::Or.fold(false)));
        let mut b = barrier.arrival(Some(BlockPredicate::Or.fold(true)));
        assert!(poll_once(&mut a).is_pending());
        assert_eq!(poll_once(&mut b), Poll::Ready(1));
    }

    #[test]
    fn test_bit_or_ballot() {
        let barrier = FiberBarrier::new(3);
        let mut lanes: Vec<_> = [0b001u64, 0, 0b100]
            .into_iter()
            .map(|bit| barrier.arrival(Some((BlockReduce::BitOr, bit))))
            .collect();
        assert!(poll_once(&mut lanes[0]).is_pending());
        assert!(poll_once(&mut lanes[1]).is_pending());
        assert_eq!(poll_once(&mut lanes[2]), Poll::Ready(0b101));
    }
}
