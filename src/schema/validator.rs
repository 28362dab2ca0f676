//! Validator application, self-test and audit
//!
//! Enforcement is delegated to the data source. This module decides which
//! level takes effect:
//! - the requested level is attempted first
//! - a failure at `error` level is retried once at `warn`
//! - the level that took effect is always logged
//!
//! The audit never mutates documents.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::errors::{SchemaError, SchemaResult};
use super::rules::{RuleChecker, ViolationKind};
use super::types::{ValidationLevel, ValidationSpec};
use crate::observability::ObservationScope;
use crate::pipeline::ast::Predicate;
use crate::store::{DataSource, FindOptions};

/// `_id` of the synthetic record inserted by `self_test`
pub const SELF_TEST_MARKER: &str = "__gm_self_test__";

/// Outcome of applying a validator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyResult {
    pub collection: String,
    /// Level that took effect
    pub level: ValidationLevel,
    /// Why the requested level was abandoned, if it was
    pub fallback_reason: Option<String>,
}

impl ApplyResult {
    /// True when the validator fell back to a weaker level
    pub fn degraded(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

impl fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.collection, self.level)?;
        if let Some(reason) = &self.fallback_reason {
            write!(f, " (fallback: {})", reason)?;
        }
        Ok(())
    }
}

/// Violation counts over the existing documents of one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub collection: String,
    pub total: u64,
    /// Documents with at least one violation
    pub invalid: u64,
    pub missing_required: BTreeMap<String, u64>,
    pub out_of_range: BTreeMap<String, u64>,
    pub type_mismatch: BTreeMap<String, u64>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }
}

fn write_counts(f: &mut fmt::Formatter<'_>, label: &str, counts: &BTreeMap<String, u64>) -> fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {}:", label)?;
    for (field, count) in counts {
        writeln!(f, "    {}: {}", field, count)?;
    }
    Ok(())
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} of {} document(s) invalid",
            self.collection, self.invalid, self.total
        )?;
        write_counts(f, "Missing required", &self.missing_required)?;
        write_counts(f, "Out of range", &self.out_of_range)?;
        write_counts(f, "Type mismatch", &self.type_mismatch)
    }
}

pub struct SchemaValidator;

impl SchemaValidator {
    /// Applies a validator, degrading from `error` to `warn` on failure.
    ///
    /// # Errors
    ///
    /// - `InvalidSpec` if the rule set is malformed
    /// - `ApplyFailed` if no level could be applied
    pub fn apply<S: DataSource + ?Sized>(
        spec: &ValidationSpec,
        source: &mut S,
    ) -> SchemaResult<ApplyResult> {
        spec.validate_structure()
            .map_err(|reason| SchemaError::InvalidSpec {
                collection: spec.collection.clone(),
                reason,
            })?;

        let scope = ObservationScope::with_subject("VALIDATOR_APPLY", &spec.collection);

        let first = match source.apply_validator(spec, spec.level) {
            Ok(()) => {
                info!(collection = %spec.collection, level = %spec.level, "validator in effect");
                let result = ApplyResult {
                    collection: spec.collection.clone(),
                    level: spec.level,
                    fallback_reason: None,
                };
                scope.complete_with(&result);
                return Ok(result);
            }
            Err(err) => err,
        };

        if spec.level != ValidationLevel::Error {
            scope.fail(&first);
            return Err(SchemaError::ApplyFailed {
                collection: spec.collection.clone(),
                source: first,
            });
        }

        warn!(
            collection = %spec.collection,
            error = %first,
            "error-level validator rejected, retrying at warn"
        );

        match source.apply_validator(spec, ValidationLevel::Warn) {
            Ok(()) => {
                warn!(collection = %spec.collection, level = %ValidationLevel::Warn, "validator in effect");
                let result = ApplyResult {
                    collection: spec.collection.clone(),
                    level: ValidationLevel::Warn,
                    fallback_reason: Some(first.to_string()),
                };
                scope.complete_with(&result);
                Ok(result)
            }
            Err(err) => {
                scope.fail(&err);
                Err(SchemaError::ApplyFailed {
                    collection: spec.collection.clone(),
                    source: err,
                })
            }
        }
    }

    /// Inserts a known-valid record tagged with `SELF_TEST_MARKER`, reads it
    /// back, then deletes it.
    pub fn self_test<S: DataSource + ?Sized>(
        spec: &ValidationSpec,
        source: &mut S,
        sample: &Value,
    ) -> SchemaResult<()> {
        let failed = |reason: String| SchemaError::SelfTestFailed {
            collection: spec.collection.clone(),
            reason,
        };

        let mut record = sample.clone();
        let Some(fields) = record.as_object_mut() else {
            return Err(failed("sample record is not an object".into()));
        };
        fields.insert("_id".into(), json!(SELF_TEST_MARKER));

        if let Some(violation) = RuleChecker::check(spec, &record).into_iter().next() {
            return Err(failed(format!("sample record is itself invalid: {}", violation)));
        }

        let marker = [Predicate::eq("_id", json!(SELF_TEST_MARKER))];
        source.delete(&spec.collection, &marker)?;

        source
            .insert(&spec.collection, record)
            .map_err(|e| failed(format!("valid record rejected: {}", e)))?;

        let found = source.count(&spec.collection, &marker)?;
        let removed = source.delete(&spec.collection, &marker)?;

        if found != 1 {
            return Err(failed(format!("expected 1 marker record, found {}", found)));
        }
        if removed != 1 {
            return Err(failed(format!("expected to remove 1 marker record, removed {}", removed)));
        }

        info!(collection = %spec.collection, "validator self-test passed");
        Ok(())
    }

    /// Counts violations in the existing documents of the validated collection
    pub fn audit<S: DataSource + ?Sized>(
        spec: &ValidationSpec,
        source: &S,
    ) -> SchemaResult<AuditReport> {
        let documents = source.find(&spec.collection, &[], &FindOptions::default())?;
        let mut report = AuditReport {
            collection: spec.collection.clone(),
            total: documents.len() as u64,
            ..AuditReport::default()
        };

        for document in &documents {
            let violations = RuleChecker::check(spec, document);
            if violations.is_empty() {
                continue;
            }
            report.invalid += 1;
            for violation in violations {
                let bucket = match violation.kind {
                    ViolationKind::MissingRequired => &mut report.missing_required,
                    ViolationKind::OutOfRange => &mut report.out_of_range,
                    ViolationKind::TypeMismatch => &mut report.type_mismatch,
                };
                *bucket.entry(violation.field).or_insert(0) += 1;
            }
        }

        if !report.is_clean() {
            warn!(
                collection = %report.collection,
                invalid = report.invalid,
                total = report.total,
                "existing documents violate the validator"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{BsonType, FieldRule};
    use crate::store::MemoryStore;

    fn spec() -> ValidationSpec {
        ValidationSpec::new("Products_clean")
            .require("product_id")
            .require("product_name")
            .property("rating", FieldRule::of(&[BsonType::Double]).min(0.0).max(5.0))
    }

    fn store(documents: Vec<Value>) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.load_documents("Products_clean", documents).unwrap();
        store
    }

    #[test]
    fn test_apply_clean_data_keeps_error_level() {
        let mut source = store(vec![json!({"product_id": "P1", "product_name": "Cable"})]);
        let result = SchemaValidator::apply(&spec(), &mut source).unwrap();
        assert_eq!(result.level, ValidationLevel::Error);
        assert!(!result.degraded());
    }

    #[test]
    fn test_apply_falls_back_to_warn() {
        let mut source = store(vec![json!({"product_name": "Cable"})]);
        let result = SchemaValidator::apply(&spec(), &mut source).unwrap();
        assert_eq!(result.level, ValidationLevel::Warn);
        assert!(result.degraded());
        assert!(result.to_string().contains("fallback"));
    }

    #[test]
    fn test_apply_missing_collection_fails() {
        let mut source = MemoryStore::new();
        let err = SchemaValidator::apply(&spec(), &mut source).unwrap_err();
        assert_eq!(err.code(), "GM_SCHEMA_APPLY_FAILED");
    }

    #[test]
    fn test_apply_rejects_malformed_spec() {
        let mut source = store(vec![]);
        let bad = ValidationSpec::new("");
        let err = SchemaValidator::apply(&bad, &mut source).unwrap_err();
        assert_eq!(err.code(), "GM_SCHEMA_INVALID_SPEC");
    }

    #[test]
    fn test_self_test_leaves_no_trace() {
        let mut source = store(vec![json!({"product_id": "P1", "product_name": "Cable"})]);
        SchemaValidator::apply(&spec(), &mut source).unwrap();

        let sample = json!({"product_id": "T1", "product_name": "Test", "rating": 4.0});
        SchemaValidator::self_test(&spec(), &mut source, &sample).unwrap();
        assert_eq!(source.count("Products_clean", &[]).unwrap(), 1);
    }

    #[test]
    fn test_self_test_rejects_invalid_sample() {
        let mut source = store(vec![]);
        let sample = json!({"product_id": "T1"});
        let err = SchemaValidator::self_test(&spec(), &mut source, &sample).unwrap_err();
        assert_eq!(err.code(), "GM_SCHEMA_SELF_TEST_FAILED");
    }

    #[test]
    fn test_audit_counts_by_kind() {
        let source = store(vec![
            json!({"product_id": "P1", "product_name": "Cable", "rating": 4.5}),
            json!({"product_name": "Mouse", "rating": 7.0}),
            json!({"product_id": "P3", "product_name": "Hub", "rating": "4,2"}),
        ]);
        let report = SchemaValidator::audit(&spec(), &source).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.invalid, 2);
        assert_eq!(report.missing_required.get("product_id"), Some(&1));
        assert_eq!(report.out_of_range.get("rating"), Some(&1));
        assert_eq!(report.type_mismatch.get("rating"), Some(&1));
        assert!(report.to_string().contains("2 of 3"));
    }
}
