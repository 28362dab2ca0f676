//! Document rule checking
//!
//! Checks a document against a `ValidationSpec`:
//! - every required field is present
//! - present fields have one of the declared types
//! - numeric fields respect their inclusive bounds
//!
//! Undeclared fields are allowed. Checking never mutates the document.

use std::fmt;

use serde_json::Value;

use super::types::{value_type_name, ValidationSpec};
use crate::store::value::get_path;

/// Kind of rule a document broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationKind {
    MissingRequired,
    TypeMismatch,
    OutOfRange,
}

/// One broken rule
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Field path
    pub field: String,
    pub kind: ViolationKind,
    /// Expected type or condition
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl Violation {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: ViolationKind::MissingRequired,
            expected: "field to be present".into(),
            actual: "missing".into(),
        }
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: ViolationKind::TypeMismatch,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn out_of_range(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: ViolationKind::OutOfRange,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': expected {}, found {}",
            self.field, self.expected, self.actual
        )
    }
}

pub struct RuleChecker;

impl RuleChecker {
    /// Returns every violation, required fields first, then properties in
    /// field-name order.
    pub fn check(spec: &ValidationSpec, document: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();

        if !document.is_object() {
            violations.push(Violation::type_mismatch(
                "$root",
                "object",
                value_type_name(document),
            ));
            return violations;
        }

        for field in &spec.required {
            if get_path(document, field).is_none() {
                violations.push(Violation::missing_field(field));
            }
        }

        for (field, rule) in &spec.properties {
            let Some(value) = get_path(document, field) else {
                continue;
            };

            if !rule.types.is_empty() && !rule.types.iter().any(|t| t.matches(value)) {
                let expected = rule
                    .types
                    .iter()
                    .map(|t| t.type_name())
                    .collect::<Vec<_>>()
                    .join(" | ");
                violations.push(Violation::type_mismatch(field, expected, value_type_name(value)));
                continue;
            }

            if let Some(n) = value.as_f64() {
                if let Some(min) = rule.minimum.filter(|min| n < *min) {
                    violations.push(Violation::out_of_range(field, format!(">= {}", min), n.to_string()));
                } else if let Some(max) = rule.maximum.filter(|max| n > *max) {
                    violations.push(Violation::out_of_range(field, format!("<= {}", max), n.to_string()));
                }
            }
        }

        violations
    }

    /// True when the document satisfies every rule
    pub fn is_valid(spec: &ValidationSpec, document: &Value) -> bool {
        Self::check(spec, document).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{BsonType, FieldRule};
    use serde_json::json;

    fn spec() -> ValidationSpec {
        ValidationSpec::new("ventas")
            .require("product_id")
            .require("date")
            .require("total_amount")
            .property("product_id", FieldRule::of(&[BsonType::String]))
            .property("date", FieldRule::of(&[BsonType::Date]))
            .property(
                "total_amount",
                FieldRule::of(&[BsonType::Double, BsonType::Int]).min(0.0),
            )
    }

    #[test]
    fn test_valid_document() {
        let doc = json!({"product_id": "P1", "date": "2024-01-02", "total_amount": 10.5});
        assert!(RuleChecker::is_valid(&spec(), &doc));
    }

    #[test]
    fn test_undeclared_fields_allowed() {
        let doc = json!({"product_id": "P1", "date": "2024-01-02", "total_amount": 1, "store": "X"});
        assert!(RuleChecker::is_valid(&spec(), &doc));
    }

    #[test]
    fn test_missing_required() {
        let doc = json!({"date": "2024-01-02", "total_amount": 1});
        let violations = RuleChecker::check(&spec(), &doc);
        assert_eq!(violations, vec![Violation::missing_field("product_id")]);
    }

    #[test]
    fn test_type_mismatch_reports_names() {
        let doc = json!({"product_id": 7, "date": "2024-01-02", "total_amount": 1});
        let violations = RuleChecker::check(&spec(), &doc);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::TypeMismatch);
        assert_eq!(violations[0].expected, "string");
        assert_eq!(violations[0].actual, "int");
    }

    #[test]
    fn test_below_minimum() {
        let doc = json!({"product_id": "P1", "date": "2024-01-02", "total_amount": -5});
        let violations = RuleChecker::check(&spec(), &doc);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::OutOfRange);
        assert!(violations[0].to_string().contains(">= 0"));
    }

    #[test]
    fn test_null_is_a_type_mismatch() {
        let doc = json!({"product_id": "P1", "date": null, "total_amount": 1});
        let violations = RuleChecker::check(&spec(), &doc);
        assert_eq!(violations[0].actual, "null");
    }

    #[test]
    fn test_non_object_document() {
        let violations = RuleChecker::check(&spec(), &json!([1, 2]));
        assert_eq!(violations[0].field, "$root");
    }
}
