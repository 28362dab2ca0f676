//! Index setup error types
//!
//! Error codes:
//! - GM_INDEX_INVALID_SPEC
//! - GM_INDEX_CONFLICT
//! - GM_INDEX_COLLECTION_NOT_FOUND
//! - GM_INDEX_STORE

use thiserror::Error;

use crate::store::StoreError;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Invalid index '{name}': {reason}")]
    InvalidSpec { name: String, reason: String },

    #[error("Index '{name}' conflicts on '{collection}': {reason}")]
    Conflict {
        collection: String,
        name: String,
        reason: String,
    },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Index '{name}' failed: {source}")]
    Store {
        name: String,
        #[source]
        source: StoreError,
    },
}

impl IndexError {
    /// Wraps a store failure for the named index
    pub fn from_store(name: impl Into<String>, source: StoreError) -> Self {
        let name = name.into();
        match source {
            StoreError::IndexConflict { collection, reason } => IndexError::Conflict {
                collection,
                name,
                reason,
            },
            StoreError::CollectionNotFound(collection) => IndexError::CollectionNotFound(collection),
            source => IndexError::Store { name, source },
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::InvalidSpec { .. } => "GM_INDEX_INVALID_SPEC",
            IndexError::Conflict { .. } => "GM_INDEX_CONFLICT",
            IndexError::CollectionNotFound(_) => "GM_INDEX_COLLECTION_NOT_FOUND",
            IndexError::Store { .. } => "GM_INDEX_STORE",
        }
    }
}
