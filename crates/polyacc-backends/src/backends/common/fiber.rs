//! Round-robin scheduler for the lanes of one block
//!
//! Each round polls every unfinished lane once. A round in which no lane
//! finishes and the barrier sees no new arrival means every remaining lane
//! waits on something that will never happen, which is reported as
//! `Deadlock` rather than spinning forever.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::task::noop_waker;

use super::launch::panic_message;
use crate::block::lane::LaneGuard;
use crate::error::{BackendError, Result};

/// Drive `fibers` (lane `i` is `fibers[i]`) to completion on this thread.
///
/// `progress` must change whenever a lane makes progress without finishing,
/// i.e. arrives at a barrier.
pub(crate) fn run_fibers<F>(block: usize, fibers: Vec<F>, progress: impl Fn() -> u64) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let lanes = fibers.len();
    let mut slots: Vec<Option<Pin<Box<F>>>> = fibers.into_iter().map(|f| Some(Box::pin(f))).collect();
    let mut errors: Vec<Option<BackendError>> = (0..lanes).map(|_| None).collect();
    let mut pending = lanes;
    let mut rounds = 0u64;

    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);

    while pending > 0 {
        let before = progress();
        let mut finished = 0;
        rounds += 1;

        for (lane, slot) in slots.iter_mut().enumerate() {
            let Some(fiber) = slot.as_mut() else {
                continue;
            };

            let _guard = LaneGuard::enter(lane);
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| fiber.as_mut().poll(&mut cx))) {
                Ok(Poll::Pending) => continue,
                Ok(Poll::Ready(outcome)) => outcome,
                Err(payload) => Err(BackendError::KernelPanicked {
                    block,
                    lane,
                    message: panic_message(&*payload),
                }),
            };

            *slot = None;
            pending -= 1;
            finished += 1;
            if let Err(err) = outcome {
                tracing::debug!(block, lane, error = %err, "fiber_failed");
                errors[lane] = Some(err);
            }
        }

        if pending > 0 && finished == 0 && progress() == before {
            tracing::debug!(block, pending, lanes, rounds, "fiber_deadlock");
            return Err(first_error(errors).unwrap_or(BackendError::Deadlock { block, pending, lanes }));
        }
    }

    tracing::trace!(block, lanes, rounds, "fibers_finished");
    first_error(errors).map_or(Ok(()), Err)
}

fn first_error(errors: Vec<Option<BackendError>>) -> Option<BackendError> {
    errors.into_iter().flatten().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockSync, FiberBarrier};
    use std::cell::RefCell;

    #[test]
    fn test_interleaves_at_barrier() {
        let barrier = FiberBarrier::new(3);
        let log = RefCell::new(Vec::new());
        let fibers: Vec<_> = (0..3)
            .map(|lane| {
                let barrier = &barrier;
                let log = &log;
                async move {
                    log.borrow_mut().push(("before", lane));
                    barrier.sync().await;
                    log.borrow_mut().push(("after", lane));
                    Ok::<(), BackendError>(())
                }
            })
            .collect();

        run_fibers(0, fibers, || barrier.arrivals()).unwrap();
        let log = log.into_inner();
        let first_after = log.iter().position(|(phase, _)| *phase == "after").unwrap();
        assert_eq!(first_after, 3);
        assert_eq!(log.len(), 6);
    }

    #[test]
    fn test_missing_arrival_is_deadlock() {
        let barrier = FiberBarrier::new(2);
        let fibers: Vec<_> = (0..2)
            .map(|lane| {
                let barrier = &barrier;
                async move {
                    if lane == 0 {
                        barrier.sync().await;
                    }
                    Ok::<(), BackendError>(())
                }
            })
            .collect();

        let err = run_fibers(4, fibers, || barrier.arrivals()).unwrap_err();
        assert!(matches!(err, BackendError::Deadlock { block: 4, pending: 1, lanes: 2 }));
    }

    #[test]
    fn test_lane_error_wins_over_deadlock() {
        let barrier = FiberBarrier::new(2);
        let fibers: Vec<_> = (0..2)
            .map(|lane| {
                let barrier = &barrier;
                async move {
                    if lane == 1 {
                        return Err(BackendError::execution_error("lane 1 gave up"));
                    }
                    barrier.sync().await;
                    Ok(())
                }
            })
            .collect();

        let err = run_fibers(0, fibers, || barrier.arrivals()).unwrap_err();
        assert!(matches!(err, BackendError::ExecutionError(_)));
    }

    #[test]
    fn test_panic_is_reported() {
        let fibers: Vec<_> = (0..2)
            .map(|lane| async move {
                if lane == 1 {
                    panic!("boom");
                }
                Ok::<(), BackendError>(())
            })
            .collect();

        let err = run_fibers(2, fibers, || 0).unwrap_err();
        match err {
            BackendError::KernelPanicked { block, lane, message } => {
                assert_eq!((block, lane), (2, 1));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
