//! Pipeline error types
//!
//! Error codes:
//! - GM_PIPELINE_INVALID_SPEC
//! - GM_PIPELINE_EXECUTION_FAILED
//! - GM_PIPELINE_WRITE_FAILED
//! - GM_PIPELINE_LOAD_FAILED
//!
//! A pipeline error is scoped to one pipeline; the runner records it and
//! moves on to the next spec.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Invalid pipeline '{name}': {reason}")]
    InvalidSpec { name: String, reason: String },

    #[error("Pipeline '{pipeline}' failed to execute: {source}")]
    Execution {
        pipeline: String,
        #[source]
        source: StoreError,
    },

    /// The output may hold `inserted` rows from this attempt
    #[error("Pipeline '{pipeline}' failed writing '{output}' after {inserted} row(s): {source}")]
    Write {
        pipeline: String,
        output: String,
        inserted: u64,
        #[source]
        source: StoreError,
    },

    #[error("Cannot load pipelines from {path}: {reason}")]
    Load { path: String, reason: String },
}

impl PipelineError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidSpec { .. } => "GM_PIPELINE_INVALID_SPEC",
            PipelineError::Execution { .. } => "GM_PIPELINE_EXECUTION_FAILED",
            PipelineError::Write { .. } => "GM_PIPELINE_WRITE_FAILED",
            PipelineError::Load { .. } => "GM_PIPELINE_LOAD_FAILED",
        }
    }
}
