//! Index planning
//!
//! Applies index specs idempotently:
//! - an identical index already present is a no-op
//! - every creation attempt is isolated; one failure never blocks the rest
//! - verification lists what is actually present per collection

use std::fmt;

use tracing::{info, warn};

use super::errors::{IndexError, IndexResult};
use super::spec::IndexSpec;
use crate::observability::ObservationScope;
use crate::store::{DataSource, IndexCreation};

/// What `ensure` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyPresent,
}

impl fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsureOutcome::Created => write!(f, "created"),
            EnsureOutcome::AlreadyPresent => write!(f, "already present"),
        }
    }
}

/// Result of one creation attempt within `ensure_all`
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub collection: String,
    pub name: String,
    pub outcome: IndexResult<EnsureOutcome>,
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(outcome) => write!(f, "{}.{}: {}", self.collection, self.name, outcome),
            Err(err) => write!(f, "{}.{}: FAILED [{}] {}", self.collection, self.name, err.code(), err),
        }
    }
}

/// Indexes present on one collection
#[derive(Debug, Clone)]
pub struct CollectionIndexes {
    pub collection: String,
    pub indexes: IndexResult<Vec<IndexSpec>>,
}

impl fmt::Display for CollectionIndexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.collection)?;
        match &self.indexes {
            Ok(indexes) => {
                for (i, index) in indexes.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, index)?;
                }
                Ok(())
            }
            Err(err) => writeln!(f, "  unavailable: {}", err),
        }
    }
}

pub struct IndexPlanner;

impl IndexPlanner {
    /// Creates the index unless an identical one exists
    pub fn ensure<S: DataSource + ?Sized>(
        spec: &IndexSpec,
        source: &mut S,
    ) -> IndexResult<EnsureOutcome> {
        spec.validate().map_err(|reason| IndexError::InvalidSpec {
            name: spec.name.clone(),
            reason,
        })?;

        match source.create_index(spec) {
            Ok(IndexCreation::Created) => {
                info!(collection = %spec.collection, index = %spec.name, key = %spec.key_pattern(), "index created");
                Ok(EnsureOutcome::Created)
            }
            Ok(IndexCreation::AlreadyExists) => {
                info!(collection = %spec.collection, index = %spec.name, "index already present");
                Ok(EnsureOutcome::AlreadyPresent)
            }
            Err(err) => Err(IndexError::from_store(&spec.name, err)),
        }
    }

    /// Ensures every index in order, isolating failures
    pub fn ensure_all<S: DataSource + ?Sized>(
        specs: &[IndexSpec],
        source: &mut S,
    ) -> Vec<IndexReport> {
        let scope = ObservationScope::new("INDEX_SETUP");

        let reports: Vec<IndexReport> = specs
            .iter()
            .map(|spec| {
                let outcome = Self::ensure(spec, source);
                if let Err(err) = &outcome {
                    warn!(
                        collection = %spec.collection,
                        index = %spec.name,
                        code = err.code(),
                        error = %err,
                        "index creation failed"
                    );
                }
                IndexReport {
                    collection: spec.collection.clone(),
                    name: spec.name.clone(),
                    outcome,
                }
            })
            .collect();

        let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
        scope.complete_with(format!("{} of {} failed", failed, reports.len()));
        reports
    }

    /// Lists the indexes present on each collection
    pub fn verify<S: DataSource + ?Sized>(
        collections: &[&str],
        source: &S,
    ) -> Vec<CollectionIndexes> {
        collections
            .iter()
            .map(|collection| CollectionIndexes {
                collection: collection.to_string(),
                indexes: source
                    .list_indexes(collection)
                    .map_err(|err| IndexError::from_store(*collection, err)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .load_documents("ventas", vec![json!({"product_id": "P1", "total_amount": 10})])
            .unwrap();
        store
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut source = store();
        let spec = IndexSpec::new("ventas", "idx_product_id").asc("product_id");
        assert_eq!(IndexPlanner::ensure(&spec, &mut source).unwrap(), EnsureOutcome::Created);
        assert_eq!(
            IndexPlanner::ensure(&spec, &mut source).unwrap(),
            EnsureOutcome::AlreadyPresent
        );
    }

    #[test]
    fn test_ensure_rejects_invalid_spec() {
        let mut source = store();
        let err = IndexPlanner::ensure(&IndexSpec::new("ventas", "empty"), &mut source).unwrap_err();
        assert_eq!(err.code(), "GM_INDEX_INVALID_SPEC");
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut source = store();
        let specs = vec![
            IndexSpec::new("ventas", "idx_a").asc("product_id"),
            IndexSpec::new("ventas", "idx_a").desc("total_amount"),
            IndexSpec::new("ventas", "idx_b").desc("total_amount"),
        ];
        let reports = IndexPlanner::ensure_all(&specs, &mut source);
        assert_eq!(reports.len(), 3);
        assert!(reports[0].outcome.is_ok());
        assert!(reports[1].outcome.is_err());
        assert!(reports[2].outcome.is_ok());
        assert!(reports[1].to_string().contains("GM_INDEX_CONFLICT"));
    }

    #[test]
    fn test_verify_lists_per_collection() {
        let mut source = store();
        IndexPlanner::ensure(&IndexSpec::new("ventas", "idx_date").desc("date"), &mut source).unwrap();

        let listing = IndexPlanner::verify(&["ventas", "missing"], &source);
        let names: Vec<String> = listing[0]
            .indexes
            .as_ref()
            .unwrap()
            .iter()
            .map(|i| i.name.clone())
            .collect();
        assert_eq!(names, vec!["_id_", "idx_date"]);
        assert!(listing[1].indexes.is_err());

        let text = listing[0].to_string();
        assert!(text.contains("2. idx_date: { date: -1 }"));
    }
}
