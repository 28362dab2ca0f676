//! The data source capability surface
//!
//! Everything the orchestration layer needs from a document store. The
//! store owns query execution, index structures and schema enforcement;
//! callers only describe what they want.

use serde_json::Value;

use super::errors::StoreResult;
use super::explain::ExecutionStats;
use crate::index::IndexSpec;
use crate::pipeline::ast::{Predicate, SortKey, Stage};
use crate::schema::{ValidationLevel, ValidationSpec};

/// Options for `DataSource::find`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn limit(limit: usize) -> Self {
        Self {
            sort: Vec::new(),
            limit: Some(limit),
        }
    }

    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }
}

/// Outcome of an index creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCreation {
    Created,
    /// An identical index with the same name already exists
    AlreadyExists,
}

/// A document store, used by a single caller at a time.
///
/// Reads never modify inputs. Writes are applied one at a time with no
/// transactional grouping.
pub trait DataSource {
    /// Documents matching every predicate, in storage order unless sorted.
    /// A missing collection reads as empty.
    fn find(&self, collection: &str, filter: &[Predicate], options: &FindOptions)
        -> StoreResult<Vec<Value>>;

    /// Number of documents matching every predicate
    fn count(&self, collection: &str, filter: &[Predicate]) -> StoreResult<u64>;

    /// Runs a stage pipeline over a collection's current snapshot
    fn aggregate(&self, collection: &str, stages: &[Stage]) -> StoreResult<Vec<Value>>;

    /// Inserts one document, creating the collection if needed
    fn insert(&mut self, collection: &str, document: Value) -> StoreResult<()>;

    /// Deletes matching documents, returning how many were removed
    fn delete(&mut self, collection: &str, filter: &[Predicate]) -> StoreResult<u64>;

    /// Drops a collection with its indexes and validator. Returns whether
    /// it existed.
    fn drop_collection(&mut self, collection: &str) -> StoreResult<bool>;

    fn create_index(&mut self, spec: &IndexSpec) -> StoreResult<IndexCreation>;

    /// Indexes present on an existing collection
    fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>>;

    /// Installs a validator at the given enforcement level
    fn apply_validator(&mut self, spec: &ValidationSpec, level: ValidationLevel)
        -> StoreResult<()>;

    /// Executes a pipeline and reports how it ran
    fn explain(&self, collection: &str, stages: &[Stage]) -> StoreResult<ExecutionStats>;

    fn collection_names(&self) -> Vec<String>;
}
