use std::fmt;

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, DdpgError>;

/// Main error type for the crate
#[derive(Debug, Clone, PartialEq)]
pub enum DdpgError {
    /// Array shapes do not line up
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Numerical computation errors
    NumericalError(String),

    /// Sampling from a buffer that holds nothing
    EmptyBuffer(String),

    /// Sampling more transitions than are currently stored
    InsufficientSamples {
        requested: usize,
        available: usize,
    },

    /// Action that cannot be delivered to the environment
    InvalidAction(String),

    /// Serialization/deserialization errors
    SerializationError(String),
}

impl fmt::Display for DdpgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdpgError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            DdpgError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            DdpgError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            DdpgError::EmptyBuffer(msg) => write!(f, "Empty buffer: {}", msg),
            DdpgError::InsufficientSamples { requested, available } => {
                write!(
                    f,
                    "Insufficient samples: requested a batch of {}, only {} stored",
                    requested, available
                )
            }
            DdpgError::InvalidAction(msg) => write!(f, "Invalid action: {}", msg),
            DdpgError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for DdpgError {}

impl From<ndarray::ShapeError> for DdpgError {
    fn from(err: ndarray::ShapeError) -> Self {
        DdpgError::DimensionMismatch {
            expected: "compatible array shapes".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DdpgError {
    fn from(err: serde_json::Error) -> Self {
        DdpgError::SerializationError(err.to_string())
    }
}

// Helper functions for common error patterns
impl DdpgError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DdpgError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        DdpgError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
