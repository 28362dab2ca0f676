//! Stage execution errors
//!
//! Only malformed stage declarations fail. Malformed data never does:
//! expressions turn it into `null` and filters drop it.

use thiserror::Error;

/// Result type for stage execution
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    #[error("bucket stage needs at least two strictly ascending boundaries, got {0:?}")]
    InvalidBoundaries(Vec<f64>),

    #[error("value {value} is outside the bucket boundaries and no default bucket is declared")]
    BucketOutOfRange { value: String },
}

impl ExecutorError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorError::InvalidBoundaries(_) => "GM_EXEC_INVALID_BOUNDARIES",
            ExecutorError::BucketOutOfRange { .. } => "GM_EXEC_BUCKET_OUT_OF_RANGE",
        }
    }
}
