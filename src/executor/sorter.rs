//! Row sorting for stage execution
//!
//! Multi-key, stable and deterministic.

use std::cmp::Ordering;

use serde_json::Value;

use crate::pipeline::ast::{SortDirection, SortKey};
use crate::store::value::{compare_values, get_path};

/// Sorts result rows
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts rows by each key in turn; ties keep their input order.
    pub fn sort(rows: &mut [Value], keys: &[SortKey]) {
        rows.sort_by(|a, b| Self::compare(a, b, keys));
    }

    fn compare(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
        for key in keys {
            let ordering = compare_values(get_path(a, &key.field), get_path(b, &key.field));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(rows: &[Value]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_sort_ascending() {
        let mut rows = vec![
            json!({"id": "c", "month": 3}),
            json!({"id": "a", "month": 1}),
            json!({"id": "b", "month": 2}),
        ];
        ResultSorter::sort(&mut rows, &[SortKey::asc("month")]);
        assert_eq!(ids(&rows), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_multi_key() {
        let mut rows = vec![
            json!({"id": "x", "year": 2024, "month": 1, "totalSales": 10.0}),
            json!({"id": "y", "year": 2023, "month": 5, "totalSales": 1.0}),
            json!({"id": "z", "year": 2024, "month": 1, "totalSales": 99.0}),
        ];
        ResultSorter::sort(
            &mut rows,
            &[
                SortKey::asc("year"),
                SortKey::asc("month"),
                SortKey::desc("totalSales"),
            ],
        );
        assert_eq!(ids(&rows), vec!["y", "z", "x"]);
    }

    #[test]
    fn test_sort_stable() {
        let mut rows = vec![
            json!({"id": "a", "score": 1}),
            json!({"id": "b", "score": 1}),
            json!({"id": "c", "score": 1}),
        ];
        ResultSorter::sort(&mut rows, &[SortKey::desc("score")]);
        assert_eq!(ids(&rows), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_field_sorts_first_ascending() {
        let mut rows = vec![json!({"id": "has", "price": 5}), json!({"id": "none"})];
        ResultSorter::sort(&mut rows, &[SortKey::asc("price")]);
        assert_eq!(ids(&rows), vec!["none", "has"]);
    }
}
