use std::fmt;

/// Result type for signal_rl operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// Main error type for the signal control crate
#[derive(Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid configuration or parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// The external traffic simulator failed (start, load, or a telemetry call).
    /// Treated as fatal by the training loop.
    Simulator(String),

    /// A strategy identifier that is not registered
    UnknownStrategy {
        kind: &'static str,
        id: String,
    },

    /// Empty buffer or container
    EmptyBuffer(String),

    /// IO errors (file operations)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),

    /// Training error
    TrainingError(String),
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            SignalError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            SignalError::Simulator(msg) => write!(f, "Simulator error: {}", msg),
            SignalError::UnknownStrategy { kind, id } => {
                write!(f, "Unknown {} strategy '{}'", kind, id)
            }
            SignalError::EmptyBuffer(msg) => write!(f, "Empty buffer: {}", msg),
            SignalError::IoError(msg) => write!(f, "IO error: {}", msg),
            SignalError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            SignalError::TrainingError(msg) => write!(f, "Training error: {}", msg),
        }
    }
}

impl std::error::Error for SignalError {}

impl From<std::io::Error> for SignalError {
    fn from(err: std::io::Error) -> Self {
        SignalError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for SignalError {
    fn from(err: bincode::Error) -> Self {
        SignalError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for SignalError {
    fn from(err: serde_json::Error) -> Self {
        SignalError::SerializationError(err.to_string())
    }
}

// Helper functions for common error patterns
impl SignalError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        SignalError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        SignalError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn simulator<S: Into<String>>(msg: S) -> Self {
        SignalError::Simulator(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = SignalError::invalid_parameter("capacity", "must be at least 1");
        assert_eq!(err.to_string(), "Invalid parameter 'capacity': must be at least 1");

        let err = SignalError::UnknownStrategy { kind: "reward", id: "bogus".to_string() };
        assert_eq!(err.to_string(), "Unknown reward strategy 'bogus'");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SignalError = io.into();
        assert!(matches!(err, SignalError::IoError(_)));
    }
}
