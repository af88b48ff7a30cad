//! Backend configuration
//!
//! Limits for host and simulated accelerator devices. Every field has a
//! default, so a JSON document only needs the keys it changes:
//!
//! ```rust
//! use polyacc_backends::BackendConfig;
//!
//! let config = BackendConfig::from_json_str(r#"{ "sim_gpu": { "device_count": 2 } }"#).unwrap();
//! assert_eq!(config.sim_gpu.device_count, 2);
//! assert_eq!(config.sim_gpu.pitch_alignment, 256);
//! ```

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::ConfigError;

/// Environment variable capping host memory in bytes
pub const ENV_HOST_MEMORY_LIMIT: &str = "POLYACC_HOST_MEMORY_LIMIT";
/// Environment variable setting threads per block of the threads backend
pub const ENV_HOST_BLOCK_THREADS: &str = "POLYACC_HOST_BLOCK_THREADS";
/// Environment variable setting fibers per block of the fibers backend
pub const ENV_HOST_FIBER_BLOCK_THREADS: &str = "POLYACC_HOST_FIBER_BLOCK_THREADS";
/// Environment variable setting host shared memory per block in bytes
pub const ENV_HOST_SHARED_MEM: &str = "POLYACC_HOST_SHARED_MEM";
/// Environment variable naming the simulated accelerator
pub const ENV_SIM_GPU_NAME: &str = "POLYACC_SIM_GPU_NAME";
/// Environment variable setting the number of simulated accelerators
pub const ENV_SIM_GPU_DEVICES: &str = "POLYACC_SIM_GPU_DEVICES";
/// Environment variable setting simulated global memory per device in bytes
pub const ENV_SIM_GPU_GLOBAL_MEM: &str = "POLYACC_SIM_GPU_GLOBAL_MEM";
/// Environment variable setting simulated shared memory per block in bytes
pub const ENV_SIM_GPU_SHARED_MEM: &str = "POLYACC_SIM_GPU_SHARED_MEM";
/// Environment variable setting simulated threads per block
pub const ENV_SIM_GPU_BLOCK_THREADS: &str = "POLYACC_SIM_GPU_BLOCK_THREADS";
/// Environment variable setting the simulated multiprocessor count
pub const ENV_SIM_GPU_MULTIPROCESSORS: &str = "POLYACC_SIM_GPU_MULTIPROCESSORS";
/// Environment variable setting the simulated pitch alignment in bytes
pub const ENV_SIM_GPU_PITCH_ALIGNMENT: &str = "POLYACC_SIM_GPU_PITCH_ALIGNMENT";
/// Environment variable setting simulated blocks per grid axis
pub const ENV_SIM_GPU_GRID_BLOCKS: &str = "POLYACC_SIM_GPU_GRID_BLOCKS";
/// Environment variable setting simulated lanes per warp
pub const ENV_SIM_GPU_WARP_SIZE: &str = "POLYACC_SIM_GPU_WARP_SIZE";

/// Numeric `POLYACC_*` variables and the field each one sets
const ENV_USIZE_FIELDS: &[(&str, fn(&mut BackendConfig, usize))] = &[
    (ENV_HOST_MEMORY_LIMIT, |c, v| c.host.memory_limit_bytes = Some(v)),
    (ENV_HOST_BLOCK_THREADS, |c, v| c.host.block_threads_max = v),
    (ENV_HOST_FIBER_BLOCK_THREADS, |c, v| c.host.fiber_block_threads_max = v),
    (ENV_HOST_SHARED_MEM, |c, v| c.host.shared_mem_bytes_max = v),
    (ENV_SIM_GPU_DEVICES, |c, v| c.sim_gpu.device_count = v),
    (ENV_SIM_GPU_GLOBAL_MEM, |c, v| c.sim_gpu.global_mem_bytes = v),
    (ENV_SIM_GPU_SHARED_MEM, |c, v| c.sim_gpu.shared_mem_bytes_max = v),
    (ENV_SIM_GPU_BLOCK_THREADS, |c, v| c.sim_gpu.block_threads_max = v),
    (ENV_SIM_GPU_MULTIPROCESSORS, |c, v| c.sim_gpu.multiprocessor_count = v),
    (ENV_SIM_GPU_PITCH_ALIGNMENT, |c, v| c.sim_gpu.pitch_alignment = v),
    (ENV_SIM_GPU_GRID_BLOCKS, |c, v| c.sim_gpu.grid_block_extent_max = v),
    (ENV_SIM_GPU_WARP_SIZE, |c, v| c.sim_gpu.warp_size = v),
];

/// Widest warp a ballot mask can describe
const WARP_SIZE_MAX: usize = u64::BITS as usize;

/// Largest block-shared region a single allocation layout can describe
const SHARED_MEM_BYTES_LIMIT: usize = isize::MAX as usize;

/// Complete backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub host: HostConfig,
    pub sim_gpu: SimGpuConfig,
}

/// Limits of the host device and the CPU backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Cap on live host buffer bytes; `None` means unlimited
    pub memory_limit_bytes: Option<usize>,
    /// Threads per block for the threads backend
    pub block_threads_max: usize,
    /// Fibers per block for the fibers backend
    pub fiber_block_threads_max: usize,
    /// Block-shared memory per block
    pub shared_mem_bytes_max: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: None,
            block_threads_max: 1024,
            fiber_block_threads_max: 64,
            shared_mem_bytes_max: 64 * 1024,
        }
    }
}

/// Shape of the simulated accelerator platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimGpuConfig {
    /// Device name reported in properties
    pub name: String,
    /// Number of devices on the platform
    pub device_count: usize,
    /// Global memory per device
    pub global_mem_bytes: usize,
    /// Shared memory per block
    pub shared_mem_bytes_max: usize,
    /// Threads per block, also the per-axis limit
    pub block_threads_max: usize,
    /// Blocks executed concurrently
    pub multiprocessor_count: usize,
    /// Row pitch alignment of pitched allocations
    pub pitch_alignment: usize,
    /// Blocks per grid axis
    pub grid_block_extent_max: usize,
    /// Lanes per warp, a power of two no larger than 64
    pub warp_size: usize,
}

impl Default for SimGpuConfig {
    fn default() -> Self {
        Self {
            name: "polyacc simulated accelerator".to_string(),
            device_count: 1,
            global_mem_bytes: 256 * 1024 * 1024,
            shared_mem_bytes_max: 48 * 1024,
            block_threads_max: 256,
            multiprocessor_count: std::thread::available_parallelism().map_or(4, |n| n.get()),
            pitch_alignment: 256,
            grid_block_extent_max: u32::MAX as usize,
            warp_size: 32,
        }
    }
}

impl BackendConfig {
    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::parse("backend config", err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `POLYACC_*` environment variables.
    ///
    /// Every field has a variable. A malformed value is an error, not ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (key, apply) in ENV_USIZE_FIELDS {
            if let Some(value) = env_usize(*key)? {
                apply(&mut config, value);
            }
        }
        if let Ok(name) = env::var(ENV_SIM_GPU_NAME) {
            config.sim_gpu.name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject zero limits, shared memory no allocation can hold, non
    /// power-of-two alignments and warps wider than a ballot mask.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = &self.host;
        non_zero("host.block_threads_max", host.block_threads_max)?;
        non_zero("host.fiber_block_threads_max", host.fiber_block_threads_max)?;
        shared_mem("host.shared_mem_bytes_max", host.shared_mem_bytes_max)?;
        if host.memory_limit_bytes == Some(0) {
            return Err(ConfigError::invalid_value("host.memory_limit_bytes", "must be positive"));
        }

        let gpu = &self.sim_gpu;
        non_zero("sim_gpu.global_mem_bytes", gpu.global_mem_bytes)?;
        shared_mem("sim_gpu.shared_mem_bytes_max", gpu.shared_mem_bytes_max)?;
        non_zero("sim_gpu.block_threads_max", gpu.block_threads_max)?;
        non_zero("sim_gpu.multiprocessor_count", gpu.multiprocessor_count)?;
        non_zero("sim_gpu.grid_block_extent_max", gpu.grid_block_extent_max)?;
        if !gpu.pitch_alignment.is_power_of_two() {
            return Err(ConfigError::invalid_value(
                "sim_gpu.pitch_alignment",
                format!("{} is not a power of two", gpu.pitch_alignment),
            ));
        }
        if !gpu.warp_size.is_power_of_two() || gpu.warp_size > WARP_SIZE_MAX {
            return Err(ConfigError::invalid_value(
                "sim_gpu.warp_size",
                format!("{} is not a power of two up to {WARP_SIZE_MAX}", gpu.warp_size),
            ));
        }
        Ok(())
    }
}

fn non_zero(key: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::invalid_value(key, "must be positive"))
    } else {
        Ok(())
    }
}

fn shared_mem(key: &'static str, bytes: usize) -> Result<(), ConfigError> {
    non_zero(key, bytes)?;
    if bytes > SHARED_MEM_BYTES_LIMIT {
        return Err(ConfigError::invalid_value(
            key,
            format!("{bytes} exceeds {SHARED_MEM_BYTES_LIMIT} bytes"),
        ));
    }
    Ok(())
}

fn env_usize(key: &'static str) -> Result<Option<usize>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::parse(key, value)),
        Err(_) => Ok(None),
    }
}
