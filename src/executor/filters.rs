//! Predicate filtering for stage execution
//!
//! Comparison rules follow document-store conventions: numbers compare
//! with numbers, strings with strings, and mixed types never satisfy a
//! range operator. `null` and missing fields never match a range.

use std::cmp::Ordering;

use serde_json::Value;

use crate::pipeline::ast::{FilterOp, Predicate};
use crate::store::value::get_path;

/// Evaluates predicates against documents
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a document matches all predicates (AND semantics)
    pub fn matches(document: &Value, predicates: &[Predicate]) -> bool {
        predicates
            .iter()
            .all(|pred| Self::matches_value(get_path(document, &pred.field), &pred.op))
    }

    /// Checks a single, possibly missing, value against an operation
    pub fn matches_value(actual: Option<&Value>, op: &FilterOp) -> bool {
        match op {
            FilterOp::Exists(flag) => actual.is_some() == *flag,
            FilterOp::Eq(expected) => Self::eq_match(actual, expected),
            FilterOp::Ne(expected) => !Self::eq_match(actual, expected),
            FilterOp::Gt(bound) => Self::range_cmp(actual, bound) == Some(Ordering::Greater),
            FilterOp::Gte(bound) => matches!(
                Self::range_cmp(actual, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt(bound) => Self::range_cmp(actual, bound) == Some(Ordering::Less),
            FilterOp::Lte(bound) => matches!(
                Self::range_cmp(actual, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }

    /// Equality; a `null` operand also matches a missing field
    fn eq_match(actual: Option<&Value>, expected: &Value) -> bool {
        match (actual, expected) {
            (None, Value::Null) => true,
            (None, _) => false,
            (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
            (Some(a), b) => a == b,
        }
    }

    fn range_cmp(actual: Option<&Value>, bound: &Value) -> Option<Ordering> {
        match (actual?, bound) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_match() {
        let doc = json!({"category_clean": "Electronics", "price": 100});

        let pred = Predicate::eq("category_clean", json!("Electronics"));
        assert!(PredicateFilter::matches(&doc, &[pred]));

        // integer and float spellings are the same number
        let pred = Predicate::eq("price", json!(100.0));
        assert!(PredicateFilter::matches(&doc, &[pred]));
    }

    #[test]
    fn test_no_type_coercion() {
        let doc = json!({"rating_count_clean": "120"});

        // a numeric string is not a number
        let pred = Predicate::gt("rating_count_clean", json!(50));
        assert!(!PredicateFilter::matches(&doc, &[pred]));
    }

    #[test]
    fn test_range_predicates() {
        let doc = json!({"price": 100});

        assert!(PredicateFilter::matches(&doc, &[Predicate::gte("price", json!(100))]));
        assert!(PredicateFilter::matches(&doc, &[Predicate::lte("price", json!(100))]));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::gt("price", json!(100))]));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::lt("price", json!(100))]));
    }

    #[test]
    fn test_null_and_missing_never_in_range() {
        let doc = json!({"rating": null});
        assert!(!PredicateFilter::matches(&doc, &[Predicate::gte("rating", json!(0))]));
        assert!(!PredicateFilter::matches(&doc, &[Predicate::lt("absent", json!(5))]));
    }

    #[test]
    fn test_exists_and_not_null() {
        let present_null = json!({"rating": null});
        let absent = json!({});
        let present = json!({"rating": 4.1});

        assert!(PredicateFilter::matches(&present_null, &[Predicate::exists("rating")]));
        assert!(!PredicateFilter::matches(&absent, &[Predicate::exists("rating")]));

        assert!(!PredicateFilter::matches(&present_null, &[Predicate::not_null("rating")]));
        assert!(!PredicateFilter::matches(&absent, &[Predicate::not_null("rating")]));
        assert!(PredicateFilter::matches(&present, &[Predicate::not_null("rating")]));
    }

    #[test]
    fn test_multiple_predicates_and() {
        let doc = json!({"rating": 4.5, "rating_count_clean": 51});

        let preds = vec![
            Predicate::not_null("rating"),
            Predicate::gt("rating_count_clean", json!(50)),
        ];
        assert!(PredicateFilter::matches(&doc, &preds));

        let preds = vec![
            Predicate::not_null("rating"),
            Predicate::gt("rating_count_clean", json!(51)),
        ];
        assert!(!PredicateFilter::matches(&doc, &preds));
    }

    #[test]
    fn test_nested_field() {
        let doc = json!({"product_info": {"category_clean": "Toys"}});
        let pred = Predicate::eq("product_info.category_clean", json!("Toys"));
        assert!(PredicateFilter::matches(&doc, &[pred]));
    }
}
