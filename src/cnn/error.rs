use std::error::Error;
use std::fmt::Display;

/// Unrecoverable precondition failures raised by the tensor engine.
#[derive(Debug)]
pub enum CnnError {
    /// Operand dimensions disagree in an elementwise or combining operation.
    ShapeMismatch {
        operation: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// Constructor-time inconsistency in an architecture descriptor.
    InvalidArchitecture(String),
    /// Stored record inconsistent with what deserialization expects.
    SerializationMismatch(String),
}

impl CnnError {
    pub fn shape_mismatch(operation: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            operation,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

impl Display for CnnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShapeMismatch {
                operation,
                expected,
                actual,
            } => write!(
                f,
                "Incompatible shapes in {}: expected {:?}, got {:?}",
                operation, expected, actual
            ),
            Self::InvalidArchitecture(msg) => write!(f, "Invalid architecture: {}", msg),
            Self::SerializationMismatch(msg) => write!(f, "Serialization mismatch: {}", msg),
        }
    }
}

impl Error for CnnError {}
