//! Error types for device, memory and launch operations

use std::fmt;

pub use polyacc_core::ConfigError;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Device memory could not be provided
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// Device capacity exhausted
    #[error("out of memory on {device}: requested {requested} bytes, {available} bytes available")]
    OutOfMemory {
        device: String,
        requested: usize,
        available: usize,
    },

    /// Device index outside the platform's device list
    #[error("invalid device index {index} (platform has {count} devices)")]
    InvalidDevice { index: usize, count: usize },

    /// Allocation with a zero extent
    #[error("zero-sized allocation with extent {extent}")]
    ZeroSized { extent: String },

    /// Size or alignment computation overflowed
    #[error("allocation layout overflow: {0}")]
    LayoutOverflow(String),
}

/// A fixed per-block resource was exceeded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    /// Block-shared memory request exceeds the available arena
    #[error("block shared memory exceeded: requested {requested} bytes, limit {limit} bytes")]
    SharedMemoryExceeded { requested: usize, limit: usize },
}

/// Errors that can occur during backend operations
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Configuration-time precondition violated
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Device memory could not be provided
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Per-block capacity exceeded
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// Source and destination extents differ
    #[error("extent mismatch: expected {expected}, got {actual}")]
    ExtentMismatch { expected: String, actual: String },

    /// Element index outside the buffer
    #[error("index {index} out of bounds for extent {extent}")]
    IndexOutOfBounds { index: String, extent: String },

    /// A kernel lane panicked
    #[error("kernel panicked in block {block}, lane {lane}: {message}")]
    KernelPanicked { block: usize, lane: usize, message: String },

    /// Lanes of a block wait on a barrier that a finished lane never reaches
    #[error("deadlock in block {block}: {pending} of {lanes} lanes blocked")]
    Deadlock { block: usize, pending: usize, lanes: usize },

    /// Execution error
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Unsupported operation
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create an extent mismatch error
    pub fn extent_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::ExtentMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: impl fmt::Display, extent: impl fmt::Display) -> Self {
        Self::IndexOutOfBounds {
            index: index.to_string(),
            extent: extent.to_string(),
        }
    }

    /// Create an execution error
    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_errors_convert() {
        let err: BackendError = CapacityError::SharedMemoryExceeded {
            requested: 128,
            limit: 64,
        }
        .into();
        assert!(matches!(err, BackendError::Capacity(_)));
        assert_eq!(
            err.to_string(),
            "block shared memory exceeded: requested 128 bytes, limit 64 bytes"
        );

        let err: BackendError = AllocationError::InvalidDevice { index: 3, count: 1 }.into();
        assert!(matches!(err, BackendError::Allocation(AllocationError::InvalidDevice { .. })));

        let err: BackendError = ConfigError::ZeroExtent { axis: 1 }.into();
        assert_eq!(err.to_string(), "zero extent along axis 1");
    }

    #[test]
    fn test_helpers() {
        let err = BackendError::extent_mismatch("(4, 8)", "(4, 9)");
        assert_eq!(err.to_string(), "extent mismatch: expected (4, 8), got (4, 9)");
        assert!(matches!(
            BackendError::execution_error("boom"),
            BackendError::ExecutionError(msg) if msg == "boom"
        ));
    }
}
