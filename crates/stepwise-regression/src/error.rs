use std::error::Error;
use std::fmt;

/// Failures raised by the stepwise orchestrator and the built-in regressors.
///
/// Public operations return `anyhow::Result`; use
/// `err.downcast_ref::<StepwiseError>()` to recover the kind. Errors raised by
/// a delegate regressor are never converted into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum StepwiseError {
    /// Invalid training configuration, e.g. a regressor kind without p-values.
    Configuration(String),
    /// The operation is deliberately not offered by this model.
    UnsupportedOperation(String),
    /// No trained model could be found in memory or in storage.
    NotFitted,
    UnknownColumn(String),
    LengthMismatch { expected: usize, found: usize },
    SingularMatrix,
    InsufficientDegreesOfFreedom { samples: usize, features: usize },
    /// The interrupt flag was raised between two elimination iterations.
    Interrupted { iteration: usize },
}

impl fmt::Display for StepwiseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepwiseError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            StepwiseError::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {}", msg),
            StepwiseError::NotFitted => write!(f, "The model has not been fitted or was erased"),
            StepwiseError::UnknownColumn(name) => write!(f, "Unknown column '{}'", name),
            StepwiseError::LengthMismatch { expected, found } => write!(
                f,
                "Column length mismatch: expected {} rows, found {}",
                expected, found
            ),
            StepwiseError::SingularMatrix => {
                write!(f, "Design matrix is singular; features are collinear")
            }
            StepwiseError::InsufficientDegreesOfFreedom { samples, features } => write!(
                f,
                "Need more samples than features to estimate p-values ({} samples, {} features)",
                samples, features
            ),
            StepwiseError::Interrupted { iteration } => {
                write!(f, "Stepwise elimination interrupted before iteration {}", iteration)
            }
        }
    }
}

impl Error for StepwiseError {}
