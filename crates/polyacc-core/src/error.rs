//! Error types for configuration-time validation

/// Result type for core operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while validating coordinate types, extents and work divisions.
///
/// These correspond to configuration-time precondition violations: they are
/// detected before any memory is touched or any kernel runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Axis index outside `[0, dim)`
    #[error("axis {axis} out of range for dimension {dim}")]
    AxisOutOfRange { axis: usize, dim: usize },

    /// Two dimensioned values disagree on their dimension
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An extent that must be positive is zero
    #[error("zero extent along axis {axis}")]
    ZeroExtent { axis: usize },

    /// A value does not fit into the requested index type
    #[error("value {value} does not fit into index type {index_type}")]
    IndexOverflow { value: i128, index_type: &'static str },

    /// Work division rejected by the accelerator limits
    #[error("invalid work division: {0}")]
    InvalidWorkDiv(String),

    /// Configuration value could not be parsed
    #[error("failed to parse {what}: {value:?}")]
    Parse { what: &'static str, value: String },

    /// Configuration value parsed but is not acceptable
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl ConfigError {
    /// Create an invalid work division error
    pub fn invalid_work_div(msg: impl Into<String>) -> Self {
        Self::InvalidWorkDiv(msg.into())
    }

    /// Create a parse error
    pub fn parse(what: &'static str, value: impl Into<String>) -> Self {
        Self::Parse {
            what,
            value: value.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigError::AxisOutOfRange { axis: 3, dim: 2 };
        assert_eq!(err.to_string(), "axis 3 out of range for dimension 2");

        let err = ConfigError::parse("coordinate kind", "uint5");
        assert_eq!(err.to_string(), "failed to parse coordinate kind: \"uint5\"");

        let err = ConfigError::invalid_work_div("block has 2048 threads, limit is 1024");
        assert!(err.to_string().contains("2048"));
    }
}
