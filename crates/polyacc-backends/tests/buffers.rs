//! Integration tests for buffers, views and explicit copies across devices

use polyacc_backends::mem::copy_to_vec;
use polyacc_backends::{
    copy, AllocationError, BackendError, Buffer, ConstView, CpuDevice, Device, HostConfig, Platform, SimGpuConfig,
    SimGpuPlatform, View,
};

fn sim_gpu_platform(device_count: usize) -> SimGpuPlatform {
    SimGpuPlatform::new(&SimGpuConfig {
        device_count,
        global_mem_bytes: 1 << 20,
        ..SimGpuConfig::default()
    })
}

#[test]
fn test_host_to_gpu_and_back() -> polyacc_backends::Result<()> {
    let host = CpuDevice::new();
    let gpu = sim_gpu_platform(1).device_by_index(0)?;

    let data: Vec<f32> = (0..12).map(|i| i as f32 * 0.5).collect();
    let mut src = Buffer::<f32, _, 2>::allocate(&host, [3, 4])?;
    src.copy_from_slice(&data)?;

    let mut on_gpu = Buffer::<f32, _, 2>::allocate_pitched(&gpu, [3, 4])?;
    copy(&mut on_gpu, &src)?;
    assert_eq!(on_gpu.pitch_bytes()[0], 256);

    let mut back = Buffer::<f32, _, 2>::allocate(&host, [3, 4])?;
    copy(&mut back, &on_gpu)?;
    assert_eq!(back.as_slice()?, data.as_slice());
    Ok(())
}

#[test]
fn test_copy_between_gpus_keeps_ledgers_separate() -> polyacc_backends::Result<()> {
    let platform = sim_gpu_platform(2);
    let gpu0 = platform.device_by_index(0)?;
    let gpu1 = platform.device_by_index(1)?;
    assert!(!gpu0.same_device(&gpu1));

    let mut a = Buffer::<u16, _, 1>::allocate(&gpu0, [100])?;
    a.fill(7);
    let mut b = Buffer::<u16, _, 1>::allocate(&gpu1, [100])?;
    copy(&mut b, &a)?;

    assert_eq!(b.to_vec(), vec![7; 100]);
    assert_eq!(gpu0.memory().live_allocations(), 1);
    assert_eq!(gpu1.memory().live_allocations(), 1);
    Ok(())
}

#[test]
fn test_copy_extent_mismatch_leaves_destination() -> polyacc_backends::Result<()> {
    let host = CpuDevice::new();
    let src = Buffer::<u8, _, 2>::allocate(&host, [2, 3])?;
    let mut dst = Buffer::<u8, _, 2>::allocate(&host, [3, 2])?;
    dst.fill(9);

    let err = copy(&mut dst, &src).unwrap_err();
    assert!(matches!(err, BackendError::ExtentMismatch { .. }));
    assert_eq!(dst.to_vec(), vec![9; 6]);
    Ok(())
}

#[test]
fn test_invalid_device_index() {
    let err = sim_gpu_platform(2).device_by_index(2).unwrap_err();
    assert!(matches!(err, AllocationError::InvalidDevice { index: 2, count: 2 }));
}

#[test]
fn test_ledger_follows_buffer_ownership() -> polyacc_backends::Result<()> {
    let host = CpuDevice::with_config(&HostConfig {
        memory_limit_bytes: Some(4096),
        ..HostConfig::default()
    });

    let first = Buffer::<u64, _, 1>::allocate(&host, [256])?;
    assert_eq!(host.memory().used_bytes(), 2048);

    // Moving a buffer transfers ownership without touching the ledger.
    let moved = first;
    assert_eq!(host.memory().live_allocations(), 1);

    let second = Buffer::<u64, _, 1>::allocate(&host, [256])?;
    let err = Buffer::<u8, _, 1>::allocate(&host, [1]).unwrap_err();
    assert!(matches!(err, BackendError::Allocation(AllocationError::OutOfMemory { .. })));

    drop(moved);
    assert_eq!(host.memory().used_bytes(), 2048);
    drop(second);
    assert_eq!(host.memory().used_bytes(), 0);
    assert_eq!(host.memory().live_allocations(), 0);
    Ok(())
}

#[test]
fn test_views_never_release_memory() -> polyacc_backends::Result<()> {
    let host = CpuDevice::new();
    let mut storage = vec![0i32; 6];
    {
        let mut view = View::<i32, _, 2>::from_slice(&host, &mut storage, [2, 3])?;
        view.copy_from_slice(&[1, 2, 3, 4, 5, 6])?;
        let copy_of = view.as_const();
        assert_eq!(copy_to_vec(&copy_of), vec![1, 2, 3, 4, 5, 6]);
    }
    assert_eq!(storage, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(host.memory().live_allocations(), 0);

    let mut buffer = Buffer::<i32, _, 2>::allocate(&host, [2, 3])?;
    {
        let mut view = buffer.view();
        view.fill(-1);
    }
    assert_eq!(host.memory().live_allocations(), 1);
    assert_eq!(buffer.to_vec(), vec![-1; 6]);
    Ok(())
}

#[test]
fn test_pitched_host_slice_view() -> polyacc_backends::Result<()> {
    let host = CpuDevice::new();
    // Two rows of three u32 with a 16-byte row pitch: one padding element per row.
    let storage = [1u32, 2, 3, 99, 4, 5, 6, 99];
    let view = ConstView::<u32, _, 2>::from_slice_pitched(&host, &storage, [2, 3], 16)?;
    assert!(view.as_slice().is_err());

    let mut dense = Buffer::<u32, _, 2>::allocate(&host, [2, 3])?;
    copy(&mut dense, &view)?;
    assert_eq!(dense.as_slice()?, &[1, 2, 3, 4, 5, 6]);
    Ok(())
}
