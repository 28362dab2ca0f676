//! Data source error types
//!
//! Every failure a backend can report to the orchestration layer. None of
//! them is fatal to a batch: callers log and continue with the next unit.

use std::io;

use thiserror::Error;

use crate::executor::ExecutorError;

/// Result type for data source operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Document rejected by validator on '{collection}': {reason}")]
    ValidationRejected { collection: String, reason: String },

    #[error("Validator conflicts with {violations} existing document(s) in '{collection}'")]
    ValidationConflict { collection: String, violations: u64 },

    #[error("Index conflict on '{collection}': {reason}")]
    IndexConflict { collection: String, reason: String },

    #[error("Duplicate key for unique index '{index}' on '{collection}'")]
    DuplicateKey { collection: String, index: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Pipeline execution failed: {0}")]
    Execution(#[from] ExecutorError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl StoreError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::CollectionNotFound(_) => "GM_STORE_COLLECTION_NOT_FOUND",
            StoreError::ValidationRejected { .. } => "GM_STORE_VALIDATION_REJECTED",
            StoreError::ValidationConflict { .. } => "GM_STORE_VALIDATION_CONFLICT",
            StoreError::IndexConflict { .. } => "GM_STORE_INDEX_CONFLICT",
            StoreError::DuplicateKey { .. } => "GM_STORE_DUPLICATE_KEY",
            StoreError::InvalidDocument(_) => "GM_STORE_INVALID_DOCUMENT",
            StoreError::InvalidDefinition(_) => "GM_STORE_INVALID_DEFINITION",
            StoreError::Execution(_) => "GM_STORE_EXECUTION_FAILED",
            StoreError::Io(_) => "GM_STORE_IO",
            StoreError::Json(_) => "GM_STORE_JSON",
        }
    }

    /// True when existing data, not the request itself, caused the failure
    pub fn is_data_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ValidationConflict { .. } | StoreError::DuplicateKey { .. }
        )
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e.to_string())
    }
}
