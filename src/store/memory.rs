//! In-memory document store
//!
//! `MemoryStore` keeps named collections of JSON documents in insertion
//! order. Each collection carries its own index catalog and optional
//! validator. Aggregation is delegated to the stage executor.
//!
//! Collections are loaded from a directory of `*.json` files (one
//! collection per file) and can be exported back as pretty JSON arrays.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::errors::{StoreError, StoreResult};
use super::explain::{ExecutionStats, StageNode, COLLECTION_SCAN, INDEX_SCAN};
use super::source::{DataSource, FindOptions, IndexCreation};
use super::value::{get_path, key_string};
use crate::executor::{CollectionResolver, PredicateFilter, ResultSorter, StageExecutor};
use crate::index::{IndexSpec, PRIMARY_INDEX};
use crate::pipeline::ast::{Predicate, Stage};
use crate::schema::{RuleChecker, ValidationLevel, ValidationSpec};

/// File extensions read by `load_dir`
const DATA_EXTENSIONS: &[&str] = &["json", "ndjson", "jsonl"];

#[derive(Debug, Clone, Default)]
struct Collection {
    documents: Vec<Value>,
    indexes: Vec<IndexSpec>,
    validator: Option<(ValidationSpec, ValidationLevel)>,
}

impl Collection {
    fn unique_key(index: &IndexSpec, document: &Value) -> Vec<String> {
        index
            .keys
            .iter()
            .map(|k| key_string(get_path(document, &k.field).unwrap_or(&Value::Null)))
            .collect()
    }

    /// Returns the name of the first unique index the document would break
    fn duplicate_for(&self, collection: &str, document: &Value) -> Option<String> {
        let primary = IndexSpec::primary(collection);
        let unique = std::iter::once(&primary).chain(self.indexes.iter().filter(|i| i.unique));

        for index in unique {
            if index.name == PRIMARY_INDEX && get_path(document, "_id").is_none() {
                continue;
            }
            if !index.covers(document) {
                continue;
            }
            let key = Self::unique_key(index, document);
            let clash = self
                .documents
                .iter()
                .filter(|d| index.covers(d))
                .any(|d| Self::unique_key(index, d) == key);
            if clash {
                return Some(index.name.clone());
            }
        }
        None
    }

    fn has_duplicates(index: &IndexSpec, documents: &[Value]) -> bool {
        let mut seen = std::collections::HashSet::new();
        documents
            .iter()
            .filter(|d| index.covers(d))
            .any(|d| !seen.insert(Self::unique_key(index, d)))
    }
}

/// Document store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw documents without validation, creating the collection.
    ///
    /// This is ingestion of source data; validators only govern writes
    /// made through `insert`.
    pub fn load_documents(&mut self, collection: &str, documents: Vec<Value>) -> StoreResult<usize> {
        if let Some(bad) = documents.iter().position(|d| !d.is_object()) {
            return Err(StoreError::InvalidDocument(format!(
                "record {} of '{}' is not an object",
                bad, collection
            )));
        }
        let count = documents.len();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .documents
            .extend(documents);
        Ok(count)
    }

    /// Loads one file as a collection named after the file stem.
    ///
    /// The file holds a JSON array or newline-delimited JSON objects.
    pub fn load_file(&mut self, path: &Path) -> StoreResult<(String, usize)> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StoreError::Io(format!("invalid file name: {}", path.display())))?
            .to_string();

        let content = fs::read_to_string(path)?;
        let documents = parse_documents(&content)?;
        let count = self.load_documents(&name, documents)?;

        debug!(collection = %name, documents = count, path = %path.display(), "collection loaded");
        Ok((name, count))
    }

    /// Loads every data file of a directory, in file-name order
    pub fn load_dir(&mut self, dir: &Path) -> StoreResult<Vec<(String, usize)>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| DATA_EXTENSIONS.contains(&e))
            })
            .collect();
        paths.sort();

        let loaded = paths
            .iter()
            .map(|p| self.load_file(p))
            .collect::<StoreResult<Vec<_>>>()?;

        info!(dir = %dir.display(), collections = loaded.len(), "data directory loaded");
        Ok(loaded)
    }

    /// Writes a collection as a pretty JSON array, returning the document count
    pub fn export_collection(&self, collection: &str, path: &Path) -> StoreResult<usize> {
        let documents = self
            .collections
            .get(collection)
            .map(|c| c.documents.as_slice())
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(documents)?;
        fs::write(path, body)?;
        Ok(documents.len())
    }

    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    fn existing(&self, collection: &str) -> StoreResult<&Collection> {
        self.collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))
    }

    /// Picks an index whose leading key is tested by the leading filter
    fn access_index<'s>(
        collection: &Collection,
        name: &str,
        stages: &'s [Stage],
    ) -> Option<(IndexSpec, Vec<&'s Predicate>)> {
        let Some(Stage::Filter { predicates }) = stages.first() else {
            return None;
        };

        let primary = IndexSpec::primary(name);
        std::iter::once(&primary)
            .chain(collection.indexes.iter())
            .filter(|index| !index.is_text())
            .filter(|index| index.partial_filter.iter().all(|p| predicates.contains(p)))
            .find_map(|index| {
                let field = index.leading_field()?;
                let used: Vec<&Predicate> =
                    predicates.iter().filter(|p| p.field == field).collect();
                (!used.is_empty()).then(|| (index.clone(), used))
            })
    }
}

fn parse_documents(content: &str) -> StoreResult<Vec<Value>> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(StoreError::from))
        .collect()
}

impl CollectionResolver for MemoryStore {
    fn documents(&self, collection: &str) -> &[Value] {
        self.collections
            .get(collection)
            .map(|c| c.documents.as_slice())
            .unwrap_or(&[])
    }
}

impl DataSource for MemoryStore {
    fn find(
        &self,
        collection: &str,
        filter: &[Predicate],
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let mut rows: Vec<Value> = self
            .documents(collection)
            .iter()
            .filter(|d| PredicateFilter::matches(d, filter))
            .cloned()
            .collect();
        ResultSorter::sort(&mut rows, &options.sort);
        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn count(&self, collection: &str, filter: &[Predicate]) -> StoreResult<u64> {
        let count = self
            .documents(collection)
            .iter()
            .filter(|d| PredicateFilter::matches(d, filter))
            .count();
        Ok(count as u64)
    }

    fn aggregate(&self, collection: &str, stages: &[Stage]) -> StoreResult<Vec<Value>> {
        let rows = self.documents(collection).to_vec();
        Ok(StageExecutor::new(self).execute(rows, stages)?)
    }

    fn insert(&mut self, collection: &str, document: Value) -> StoreResult<()> {
        if !document.is_object() {
            return Err(StoreError::InvalidDocument(format!(
                "insert into '{}' requires an object",
                collection
            )));
        }

        let target = self.collections.entry(collection.to_string()).or_default();

        if let Some((spec, level)) = &target.validator {
            let violations = RuleChecker::check(spec, &document);
            if !violations.is_empty() {
                let reason = violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                match level {
                    ValidationLevel::Error => {
                        return Err(StoreError::ValidationRejected {
                            collection: collection.to_string(),
                            reason,
                        })
                    }
                    ValidationLevel::Warn => {
                        warn!(collection, %reason, "document accepted with validation warnings");
                    }
                }
            }
        }

        if let Some(index) = target.duplicate_for(collection, &document) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                index,
            });
        }

        target.documents.push(document);
        Ok(())
    }

    fn delete(&mut self, collection: &str, filter: &[Predicate]) -> StoreResult<u64> {
        let Some(target) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = target.documents.len();
        target
            .documents
            .retain(|d| !PredicateFilter::matches(d, filter));
        Ok((before - target.documents.len()) as u64)
    }

    fn drop_collection(&mut self, collection: &str) -> StoreResult<bool> {
        Ok(self.collections.remove(collection).is_some())
    }

    fn create_index(&mut self, spec: &IndexSpec) -> StoreResult<IndexCreation> {
        spec.validate().map_err(StoreError::InvalidDefinition)?;

        let conflict = |reason: String| StoreError::IndexConflict {
            collection: spec.collection.clone(),
            reason,
        };

        let primary = IndexSpec::primary(&spec.collection);
        let target = self.collections.entry(spec.collection.clone()).or_default();

        if let Some(existing) = std::iter::once(&primary)
            .chain(target.indexes.iter())
            .find(|i| i.name == spec.name)
        {
            if existing == spec {
                return Ok(IndexCreation::AlreadyExists);
            }
            return Err(conflict(format!(
                "index '{}' already exists with key {}",
                existing.name,
                existing.key_pattern()
            )));
        }

        if let Some(existing) = std::iter::once(&primary)
            .chain(target.indexes.iter())
            .find(|i| i.same_keys(spec))
        {
            return Err(conflict(format!(
                "key {} is already indexed as '{}'",
                spec.key_pattern(),
                existing.name
            )));
        }

        if spec.is_text() {
            if let Some(existing) = target.indexes.iter().find(|i| i.is_text()) {
                return Err(conflict(format!(
                    "collection already has text index '{}'",
                    existing.name
                )));
            }
        }

        if spec.unique && Collection::has_duplicates(spec, &target.documents) {
            return Err(StoreError::DuplicateKey {
                collection: spec.collection.clone(),
                index: spec.name.clone(),
            });
        }

        target.indexes.push(spec.clone());
        Ok(IndexCreation::Created)
    }

    fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>> {
        let target = self.existing(collection)?;
        let mut indexes = vec![IndexSpec::primary(collection)];
        indexes.extend(target.indexes.iter().cloned());
        Ok(indexes)
    }

    fn apply_validator(
        &mut self,
        spec: &ValidationSpec,
        level: ValidationLevel,
    ) -> StoreResult<()> {
        spec.validate_structure()
            .map_err(StoreError::InvalidDefinition)?;

        let target = self
            .collections
            .get_mut(&spec.collection)
            .ok_or_else(|| StoreError::CollectionNotFound(spec.collection.clone()))?;

        if level == ValidationLevel::Error {
            let violations = target
                .documents
                .iter()
                .filter(|d| !RuleChecker::is_valid(spec, d))
                .count() as u64;
            if violations > 0 {
                return Err(StoreError::ValidationConflict {
                    collection: spec.collection.clone(),
                    violations,
                });
            }
        }

        target.validator = Some((spec.clone(), level));
        Ok(())
    }

    fn explain(&self, collection: &str, stages: &[Stage]) -> StoreResult<ExecutionStats> {
        let start = Instant::now();
        let target = self.existing(collection)?;

        let (leaf, docs_examined) = match Self::access_index(target, collection, stages) {
            Some((index, predicates)) => {
                let examined = target
                    .documents
                    .iter()
                    .filter(|d| index.covers(d))
                    .filter(|d| {
                        predicates
                            .iter()
                            .all(|p| PredicateFilter::matches(d, std::slice::from_ref(*p)))
                    })
                    .count();
                (StageNode::leaf(INDEX_SCAN, Some(index.name)), examined)
            }
            None => (StageNode::leaf(COLLECTION_SCAN, None), target.documents.len()),
        };

        let output = self.aggregate(collection, stages)?;
        let stage_tree = stages
            .iter()
            .fold(leaf, |input, stage| StageNode::wrap(stage.name(), input));

        Ok(ExecutionStats {
            time_millis: start.elapsed().as_millis() as u64,
            docs_examined: docs_examined as u64,
            docs_returned: output.len() as u64,
            stage_tree,
        })
    }

    fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}
