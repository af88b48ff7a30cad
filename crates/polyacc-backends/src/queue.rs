//! In-order work queues and completion events
//!
//! A queue runs tasks against one backend in submission order. A
//! [`BlockingQueue`] runs each task before `enqueue` returns; a
//! [`NonBlockingQueue`] hands it to a worker thread and returns at once.
//! An [`Event`] marks a point in a queue and completes once every task
//! enqueued before it has finished.
//!
//! ```rust
//! use polyacc_backends::{CpuDevice, CpuSerial, NonBlockingQueue, Queue};
//!
//! # fn main() -> polyacc_backends::Result<()> {
//! let queue = NonBlockingQueue::new(CpuSerial::new(CpuDevice::new()))?;
//! queue.enqueue(|_backend| Ok(()))?;
//! let done = queue.record();
//! done.wait();
//! assert!(done.is_complete());
//! queue.wait()?;
//! # Ok(())
//! # }
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::backend::Backend;
use crate::backends::panic_message;
use crate::error::{BackendError, Result};

/// Work submitted to a queue
pub type Task<B> = Box<dyn FnOnce(&B) -> Result<()> + Send + 'static>;

#[derive(Default)]
struct Progress {
    submitted: u64,
    completed: u64,
    failure: Option<BackendError>,
}

#[derive(Default)]
struct QueueState {
    progress: Mutex<Progress>,
    done: Condvar,
}

impl QueueState {
    fn submit(&self) -> u64 {
        let mut progress = self.progress.lock();
        progress.submitted += 1;
        progress.submitted
    }

    fn complete(&self, failure: Option<BackendError>) {
        let mut progress = self.progress.lock();
        progress.completed += 1;
        if progress.failure.is_none() {
            progress.failure = failure;
        }
        self.done.notify_all();
    }

    fn wait_until(&self, target: u64) {
        let mut progress = self.progress.lock();
        while progress.completed < target {
            self.done.wait(&mut progress);
        }
    }

    fn marker(self: &Arc<Self>) -> Event {
        Event {
            state: Arc::clone(self),
            target: self.progress.lock().submitted,
        }
    }
}

/// A point in a queue's task order
#[derive(Clone)]
pub struct Event {
    state: Arc<QueueState>,
    target: u64,
}

impl Event {
    /// Whether every task enqueued before this event has finished
    pub fn is_complete(&self) -> bool {
        self.state.progress.lock().completed >= self.target
    }

    /// Block the calling thread until the event completes
    pub fn wait(&self) {
        self.state.wait_until(self.target);
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("target", &self.target)
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// An in-order task queue bound to one backend
pub trait Queue {
    type Backend: Backend;

    fn backend(&self) -> &Self::Backend;

    /// Submit a task behind every task already enqueued
    fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&Self::Backend) -> Result<()> + Send + 'static;

    /// An event that completes with the tasks enqueued so far
    fn record(&self) -> Event;

    /// Hold back later tasks until `event` completes
    fn wait_for(&self, event: &Event) -> Result<()>;

    /// Whether every enqueued task has finished
    fn is_empty(&self) -> bool;

    /// Block until every enqueued task has finished.
    ///
    /// # Errors
    ///
    /// Returns the first failure of a task since the previous `wait`.
    fn wait(&self) -> Result<()>;
}

/// Runs each task on the calling thread before `enqueue` returns
pub struct BlockingQueue<B> {
    backend: B,
    state: Arc<QueueState>,
}

impl<B: Backend> BlockingQueue<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Arc::default(),
        }
    }
}

impl<B: Backend> Queue for BlockingQueue<B> {
    type Backend = B;

    fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs `task` now; its failure is returned here, not from [`Queue::wait`].
    fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&B) -> Result<()> + Send + 'static,
    {
        self.state.submit();
        let outcome = task(&self.backend);
        self.state.complete(None);
        outcome
    }

    fn record(&self) -> Event {
        self.state.marker()
    }

    fn wait_for(&self, event: &Event) -> Result<()> {
        event.wait();
        Ok(())
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn wait(&self) -> Result<()> {
        Ok(())
    }
}

/// Runs tasks in order on a dedicated worker thread
pub struct NonBlockingQueue<B> {
    backend: Arc<B>,
    state: Arc<QueueState>,
    sender: Option<Sender<Task<B>>>,
    worker: Option<JoinHandle<()>>,
}

impl<B: Backend + Send + Sync + 'static> NonBlockingQueue<B> {
    /// Start the worker thread for `backend`.
    ///
    /// # Errors
    ///
    /// - `ExecutionError` when the worker thread cannot be spawned
    pub fn new(backend: B) -> Result<Self> {
        let backend = Arc::new(backend);
        let state = Arc::new(QueueState::default());
        let (sender, receiver) = channel::<Task<B>>();

        let worker = {
            let backend = Arc::clone(&backend);
            let state = Arc::clone(&state);
            let name = format!("polyacc-queue-{}", backend.name());
            thread::Builder::new()
                .name(name)
                .spawn(move || {
                    for task in receiver {
                        let failure = match panic::catch_unwind(AssertUnwindSafe(|| task(&*backend))) {
                            Ok(Ok(())) => None,
                            Ok(Err(err)) => Some(err),
                            Err(payload) => Some(BackendError::ExecutionError(format!(
                                "queued task panicked: {}",
                                panic_message(&*payload)
                            ))),
                        };
                        if let Some(err) = &failure {
                            tracing::warn!(backend = backend.name(), error = %err, "queued_task_failed");
                        }
                        state.complete(failure);
                    }
                    tracing::debug!(backend = backend.name(), "queue_worker_stopped");
                })
                .map_err(|err| BackendError::ExecutionError(format!("spawning queue worker: {err}")))?
        };

        Ok(Self {
            backend,
            state,
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl<B: Backend + Send + Sync + 'static> Queue for NonBlockingQueue<B> {
    type Backend = B;

    fn backend(&self) -> &B {
        &self.backend
    }

    fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&B) -> Result<()> + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| BackendError::ExecutionError("queue is shut down".to_string()))?;
        let position = self.state.submit();
        if sender.send(Box::new(task)).is_err() {
            self.state.complete(None);
            return Err(BackendError::ExecutionError("queue worker stopped".to_string()));
        }
        tracing::trace!(backend = self.backend.name(), position, "task_enqueued");
        Ok(())
    }

    fn record(&self) -> Event {
        self.state.marker()
    }

    fn wait_for(&self, event: &Event) -> Result<()> {
        let event = event.clone();
        self.enqueue(move |_| {
            event.wait();
            Ok(())
        })
    }

    fn is_empty(&self) -> bool {
        let progress = self.state.progress.lock();
        progress.completed == progress.submitted
    }

    fn wait(&self) -> Result<()> {
        self.record().wait();
        self.state.progress.lock().failure.take().map_or(Ok(()), Err)
    }
}

impl<B> Drop for NonBlockingQueue<B> {
    fn drop(&mut self) {
        // the worker drains what is queued, then sees the closed channel
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::CpuSerial;
    use crate::device::CpuDevice;
    use std::time::Duration;

    fn serial() -> CpuSerial {
        CpuSerial::new(CpuDevice::new())
    }

    #[test]
    fn test_blocking_queue_runs_inline() {
        let queue = BlockingQueue::new(serial());
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let task_log = Arc::clone(&log);
            queue.enqueue(move |_| {
                task_log.lock().push(i);
                Ok(())
            })
            .unwrap();
            assert_eq!(log.lock().len(), i + 1);
        }
        assert!(queue.record().is_complete());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_blocking_queue_returns_task_error() {
        let queue = BlockingQueue::new(serial());
        let err = queue
            .enqueue(|_| Err(BackendError::Other("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, BackendError::Other(ref msg) if msg == "boom"));
        queue.wait().unwrap();
    }

    #[test]
    fn test_non_blocking_queue_keeps_order() {
        let queue = NonBlockingQueue::new(serial()).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let log = Arc::clone(&log);
            queue
                .enqueue(move |_| {
                    log.lock().push(i);
                    Ok(())
                })
                .unwrap();
        }
        queue.wait().unwrap();
        assert!(queue.is_empty());
        assert_eq!(*log.lock(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_event_completes_after_earlier_tasks() {
        let queue = NonBlockingQueue::new(serial()).unwrap();
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        {
            let gate = Arc::clone(&gate);
            queue
                .enqueue(move |_| {
                    let (open, cv) = &*gate;
                    let mut open = open.lock();
                    while !*open {
                        cv.wait(&mut open);
                    }
                    Ok(())
                })
                .unwrap();
        }
        let event = queue.record();
        thread::sleep(Duration::from_millis(10));
        assert!(!event.is_complete());
        assert!(!queue.is_empty());

        *gate.0.lock() = true;
        gate.1.notify_all();
        event.wait();
        assert!(event.is_complete());
    }

    #[test]
    fn test_wait_reports_first_failure_once() {
        let queue = NonBlockingQueue::new(serial()).unwrap();
        queue.enqueue(|_| Err(BackendError::Other("first".to_string()))).unwrap();
        queue.enqueue(|_| Err(BackendError::Other("second".to_string()))).unwrap();
        queue.enqueue(|_| Ok(())).unwrap();

        let err = queue.wait().unwrap_err();
        assert!(matches!(err, BackendError::Other(ref msg) if msg == "first"));
        queue.wait().unwrap();
    }

    #[test]
    fn test_panicking_task_keeps_worker_alive() {
        let queue = NonBlockingQueue::new(serial()).unwrap();
        queue.enqueue(|_| panic!("task exploded")).unwrap();
        let err = queue.wait().unwrap_err();
        assert!(err.to_string().contains("task exploded"), "{err}");

        queue.enqueue(|_| Ok(())).unwrap();
        queue.wait().unwrap();
    }

    #[test]
    fn test_wait_for_orders_across_queues() {
        let first = NonBlockingQueue::new(serial()).unwrap();
        let second = NonBlockingQueue::new(serial()).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        {
            let log = Arc::clone(&log);
            first
                .enqueue(move |_| {
                    thread::sleep(Duration::from_millis(20));
                    log.lock().push("first");
                    Ok(())
                })
                .unwrap();
        }
        second.wait_for(&first.record()).unwrap();
        {
            let log = Arc::clone(&log);
            second
                .enqueue(move |_| {
                    log.lock().push("second");
                    Ok(())
                })
                .unwrap();
        }

        second.wait().unwrap();
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_drop_drains_pending_tasks() {
        let log = Arc::new(Mutex::new(0));
        {
            let queue = NonBlockingQueue::new(serial()).unwrap();
            for _ in 0..10 {
                let log = Arc::clone(&log);
                queue
                    .enqueue(move |_| {
                        *log.lock() += 1;
                        Ok(())
                    })
                    .unwrap();
            }
        }
        assert_eq!(*log.lock(), 10);
    }
}
