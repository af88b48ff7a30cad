//! Kernels launched through queues

use std::sync::Arc;

use parking_lot::Mutex;
use polyacc_backends::mem::Accessor;
use polyacc_backends::{
    Acc, Backend, BlockingQueue, Buffer, CpuDevice, CpuThreads, Device, Kernel, NonBlockingQueue, Queue, Result, SimGpu,
    SimGpuDevice, WorkDiv,
};

/// `data[i] = data[i] * 2 + add`
struct DoubleAdd<'a> {
    data: Accessor<'a, u32, 1>,
    add: u32,
}

impl Kernel<1> for DoubleAdd<'_> {
    async fn run<A: Acc<1>>(&self, acc: &A) -> Result<()> {
        let i = acc.grid_thread_linear_idx();
        // SAFETY: each lane owns element `i`.
        unsafe { self.data.set([i], self.data.get([i]) * 2 + self.add) };
        Ok(())
    }
}

fn enqueue_step<Q, D>(queue: &Q, data: &Arc<Mutex<Buffer<u32, D, 1>>>, add: u32)
where
    Q: Queue,
    Q::Backend: Backend<Device = D>,
    D: Device + 'static,
    Buffer<u32, D, 1>: Send,
{
    let data = Arc::clone(data);
    queue
        .enqueue(move |backend| {
            let mut data = data.lock();
            let wd = WorkDiv::linear(2, 4, 1)?;
            backend.launch(&wd, &DoubleAdd { data: data.accessor_mut(), add })
        })
        .unwrap();
}

#[test]
fn test_non_blocking_queue_runs_launches_in_order() {
    let queue = NonBlockingQueue::new(SimGpu::new(SimGpuDevice::default()).unwrap()).unwrap();
    let data = Arc::new(Mutex::new(
        Buffer::<u32, _, 1>::allocate(queue.backend().device(), [8]).unwrap(),
    ));

    // ((0 * 2 + 1) * 2 + 2) * 2 + 3 = 11, order sensitive
    for add in 1..=3 {
        enqueue_step(&queue, &data, add);
    }
    let done = queue.record();
    queue.wait().unwrap();
    assert!(done.is_complete());
    assert_eq!(data.lock().to_vec(), vec![11; 8]);
}

#[test]
fn test_blocking_queue_launch_visible_on_return() {
    let device = CpuDevice::new();
    let queue = BlockingQueue::new(CpuThreads::new(device.clone()));
    let data = Arc::new(Mutex::new(Buffer::<u32, _, 1>::allocate(&device, [8]).unwrap()));

    enqueue_step(&queue, &data, 5);
    assert_eq!(data.lock().to_vec(), vec![5; 8]);
}
