//! Schema error types
//!
//! Error codes:
//! - GM_SCHEMA_INVALID_SPEC
//! - GM_SCHEMA_APPLY_FAILED
//! - GM_SCHEMA_SELF_TEST_FAILED
//! - GM_SCHEMA_STORE

use thiserror::Error;

use crate::store::StoreError;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("Invalid validation spec for '{collection}': {reason}")]
    InvalidSpec { collection: String, reason: String },

    /// Neither the requested level nor the warn fallback could be applied
    #[error("Validator could not be applied to '{collection}': {source}")]
    ApplyFailed {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Self-test failed on '{collection}': {reason}")]
    SelfTestFailed { collection: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SchemaError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::InvalidSpec { .. } => "GM_SCHEMA_INVALID_SPEC",
            SchemaError::ApplyFailed { .. } => "GM_SCHEMA_APPLY_FAILED",
            SchemaError::SelfTestFailed { .. } => "GM_SCHEMA_SELF_TEST_FAILED",
            SchemaError::Store(_) => "GM_SCHEMA_STORE",
        }
    }
}
