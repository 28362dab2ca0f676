//! Stage interpreter
//!
//! Applies an ordered list of declarative stages to a row stream. Inputs
//! are never mutated; every stage consumes the previous stage's rows.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::accumulators::AccumulatorEval;
use super::errors::{ExecutorError, ExecutorResult};
use super::expr::ExprEvaluator;
use super::filters::PredicateFilter;
use super::sorter::ResultSorter;
use crate::pipeline::ast::{Expr, NamedAccumulator, NamedExpr, Predicate, Stage};
use crate::store::value::{as_f64, get_path, key_string, number, set_path};

/// Source of the documents a `Lookup` stage joins against
pub trait CollectionResolver {
    /// Documents of a collection; unknown collections are empty
    fn documents(&self, collection: &str) -> &[Value];
}

/// Executes stages against rows, resolving joins through `R`
pub struct StageExecutor<'a, R: CollectionResolver + ?Sized> {
    resolver: &'a R,
}

impl<'a, R: CollectionResolver + ?Sized> StageExecutor<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        Self { resolver }
    }

    /// Runs every stage in order.
    pub fn execute(&self, rows: Vec<Value>, stages: &[Stage]) -> ExecutorResult<Vec<Value>> {
        stages
            .iter()
            .try_fold(rows, |rows, stage| self.execute_stage(rows, stage))
    }

    fn execute_stage(&self, rows: Vec<Value>, stage: &Stage) -> ExecutorResult<Vec<Value>> {
        let rows = match stage {
            Stage::Filter { predicates } => Self::filter(rows, predicates),
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => self.lookup(rows, from, local_field, foreign_field, as_field),
            Stage::Derive { fields } => Self::derive(rows, fields),
            Stage::Group { key, accumulators } => Self::group(rows, key, accumulators),
            Stage::Bucket {
                group_by,
                boundaries,
                default,
                output,
            } => Self::bucket(rows, group_by, boundaries, default.as_deref(), output)?,
            Stage::Sort { keys } => {
                let mut rows = rows;
                ResultSorter::sort(&mut rows, keys);
                rows
            }
            Stage::Project { fields } => Self::project(rows, fields),
            Stage::Limit { count } => {
                let mut rows = rows;
                rows.truncate(*count);
                rows
            }
        };
        Ok(rows)
    }

    fn filter(rows: Vec<Value>, predicates: &[Predicate]) -> Vec<Value> {
        rows.into_iter()
            .filter(|row| PredicateFilter::matches(row, predicates))
            .collect()
    }

    /// Inner join with unwind. Left rows whose key is missing, null or
    /// unmatched produce no output.
    fn lookup(
        &self,
        rows: Vec<Value>,
        from: &str,
        local_field: &str,
        foreign_field: &str,
        as_field: &str,
    ) -> Vec<Value> {
        let mut by_key: HashMap<String, Vec<&Value>> = HashMap::new();
        for doc in self.resolver.documents(from) {
            if let Some(key) = get_path(doc, foreign_field).filter(|v| !v.is_null()) {
                by_key.entry(key_string(key)).or_default().push(doc);
            }
        }

        let mut joined = Vec::new();
        for row in &rows {
            let Some(matches) = get_path(row, local_field)
                .filter(|v| !v.is_null())
                .and_then(|key| by_key.get(&key_string(key)))
            else {
                continue;
            };

            for foreign in matches {
                let mut out = row.clone();
                if let Value::Object(map) = &mut out {
                    set_path(map, as_field, (*foreign).clone());
                }
                joined.push(out);
            }
        }
        joined
    }

    /// All fields are computed from the incoming row, then written.
    fn derive(rows: Vec<Value>, fields: &[NamedExpr]) -> Vec<Value> {
        rows.into_iter()
            .map(|mut row| {
                let computed: Vec<Value> = fields
                    .iter()
                    .map(|field| ExprEvaluator::evaluate(&field.expr, &row))
                    .collect();
                if let Value::Object(map) = &mut row {
                    for (field, value) in fields.iter().zip(computed) {
                        set_path(map, &field.name, value);
                    }
                }
                row
            })
            .collect()
    }

    /// Groups keep first-seen key order so output is reproducible.
    fn group(rows: Vec<Value>, key: &[NamedExpr], accumulators: &[NamedAccumulator]) -> Vec<Value> {
        let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for row in rows {
            let group_key = Self::group_key(key, &row);
            let lookup = key_string(&group_key);
            match positions.get(&lookup) {
                Some(&pos) => groups[pos].1.push(row),
                None => {
                    positions.insert(lookup, groups.len());
                    groups.push((group_key, vec![row]));
                }
            }
        }

        groups
            .into_iter()
            .map(|(id, members)| Self::summarize(id, &members, accumulators))
            .collect()
    }

    /// Compound key object; an empty key groups everything under `null`.
    fn group_key(key: &[NamedExpr], row: &Value) -> Value {
        if key.is_empty() {
            return Value::Null;
        }
        let mut object = Map::new();
        for field in key {
            object.insert(field.name.clone(), ExprEvaluator::evaluate(&field.expr, row));
        }
        Value::Object(object)
    }

    fn bucket(
        rows: Vec<Value>,
        group_by: &Expr,
        boundaries: &[f64],
        default: Option<&str>,
        output: &[NamedAccumulator],
    ) -> ExecutorResult<Vec<Value>> {
        if boundaries.len() < 2 || boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ExecutorError::InvalidBoundaries(boundaries.to_vec()));
        }

        let mut slots: Vec<Vec<Value>> = vec![Vec::new(); boundaries.len() - 1];
        let mut overflow = Vec::new();

        for row in rows {
            let value = ExprEvaluator::evaluate(group_by, &row);
            let slot = as_f64(&value)
                .and_then(|v| boundaries.windows(2).position(|w| v >= w[0] && v < w[1]));

            match (slot, default) {
                (Some(pos), _) => slots[pos].push(row),
                (None, Some(_)) => overflow.push(row),
                (None, None) => {
                    return Err(ExecutorError::BucketOutOfRange {
                        value: value.to_string(),
                    })
                }
            }
        }

        let mut result = Vec::new();
        for (lower, members) in boundaries.iter().zip(&slots) {
            if !members.is_empty() {
                result.push(Self::summarize(Self::boundary_id(*lower), members, output));
            }
        }
        if let Some(label) = default {
            if !overflow.is_empty() {
                result.push(Self::summarize(Value::from(label), &overflow, output));
            }
        }
        Ok(result)
    }

    fn boundary_id(lower: f64) -> Value {
        if lower.fract() == 0.0 && lower.abs() < 9.0e15 {
            Value::from(lower as i64)
        } else {
            number(lower)
        }
    }

    fn summarize(id: Value, members: &[Value], accumulators: &[NamedAccumulator]) -> Value {
        let mut out = Map::new();
        out.insert("_id".to_string(), id);
        for acc in accumulators {
            out.insert(
                acc.name.clone(),
                AccumulatorEval::evaluate(&acc.accumulator, members),
            );
        }
        Value::Object(out)
    }

    /// Bare references to missing fields are left out of the output row.
    fn project(rows: Vec<Value>, fields: &[NamedExpr]) -> Vec<Value> {
        rows.iter()
            .map(|row| {
                let mut out = Map::new();
                for field in fields {
                    if let Some(value) = ExprEvaluator::evaluate_opt(&field.expr, row) {
                        set_path(&mut out, &field.name, value);
                    }
                }
                Value::Object(out)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ast::{Accumulator, SortKey};
    use serde_json::json;

    struct Fixture {
        products: Vec<Value>,
    }

    impl CollectionResolver for Fixture {
        fn documents(&self, collection: &str) -> &[Value] {
            match collection {
                "products" => &self.products,
                _ => &[],
            }
        }
    }

    fn fixture() -> Fixture {
        Fixture {
            products: vec![
                json!({"product_id": "P1", "category_clean": "Audio"}),
                json!({"product_id": "P2", "category_clean": "Cables"}),
            ],
        }
    }

    fn lookup_stage(from: &str) -> Stage {
        Stage::Lookup {
            from: from.into(),
            local_field: "product_id".into(),
            foreign_field: "product_id".into(),
            as_field: "product_info".into(),
        }
    }

    #[test]
    fn test_lookup_drops_unmatched_rows() {
        let fx = fixture();
        let exec = StageExecutor::new(&fx);
        let sales = vec![
            json!({"product_id": "P1", "total_amount": 10}),
            json!({"product_id": "P9", "total_amount": 99}),
            json!({"total_amount": 5}),
        ];

        let rows = exec.execute(sales, &[lookup_stage("products")]).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["product_info"]["category_clean"], json!("Audio"));
    }

    #[test]
    fn test_lookup_against_unknown_collection_is_empty() {
        let fx = fixture();
        let exec = StageExecutor::new(&fx);
        let rows = exec
            .execute(vec![json!({"product_id": "P1"})], &[lookup_stage("nowhere")])
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_group_first_seen_order() {
        let fx = fixture();
        let exec = StageExecutor::new(&fx);
        let rows = vec![
            json!({"c": "b", "v": 1}),
            json!({"c": "a", "v": 2}),
            json!({"c": "b", "v": 3}),
        ];
        let stage = Stage::Group {
            key: vec![NamedExpr::keep("c")],
            accumulators: vec![
                NamedAccumulator::new("total", Accumulator::Sum(Expr::field("v"))),
                NamedAccumulator::new("n", Accumulator::Count),
            ],
        };

        let out = exec.execute(rows, &[stage]).unwrap();

        assert_eq!(
            out,
            vec![
                json!({"_id": {"c": "b"}, "total": 4.0, "n": 2}),
                json!({"_id": {"c": "a"}, "total": 2.0, "n": 1}),
            ]
        );
    }

    #[test]
    fn test_group_without_key() {
        let fx = fixture();
        let exec = StageExecutor::new(&fx);
        let stage = Stage::Group {
            key: vec![],
            accumulators: vec![NamedAccumulator::new("n", Accumulator::Count)],
        };
        let out = exec.execute(vec![json!({}), json!({})], &[stage]).unwrap();
        assert_eq!(out, vec![json!({"_id": null, "n": 2})]);
    }

    fn bucket_stage(default: Option<&str>) -> Stage {
        Stage::Bucket {
            group_by: Expr::field("p"),
            boundaries: vec![0.0, 100.0, 500.0],
            default: default.map(String::from),
            output: vec![NamedAccumulator::new("count", Accumulator::Count)],
        }
    }

    #[test]
    fn test_bucket_lower_bound_inclusive() {
        let fx = fixture();
        let exec = StageExecutor::new(&fx);
        let rows = vec![json!({"p": 99.99}), json!({"p": 100}), json!({"p": 750})];

        let out = exec.execute(rows, &[bucket_stage(Some("Other"))]).unwrap();

        assert_eq!(
            out,
            vec![
                json!({"_id": 0, "count": 1}),
                json!({"_id": 100, "count": 1}),
                json!({"_id": "Other", "count": 1}),
            ]
        );
    }

    #[test]
    fn test_bucket_without_default_rejects_outliers() {
        let fx = fixture();
        let exec = StageExecutor::new(&fx);
        let err = exec
            .execute(vec![json!({"p": 900})], &[bucket_stage(None)])
            .unwrap_err();
        assert_eq!(err.code(), "GM_EXEC_BUCKET_OUT_OF_RANGE");
    }

    #[test]
    fn test_bucket_rejects_unsorted_boundaries() {
        let fx = fixture();
        let exec = StageExecutor::new(&fx);
        let stage = Stage::Bucket {
            group_by: Expr::field("p"),
            boundaries: vec![10.0, 5.0],
            default: None,
            output: vec![],
        };
        let err = exec.execute(vec![], &[stage]).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidBoundaries(_)));
    }

    #[test]
    fn test_derive_project_sort_limit() {
        let fx = fixture();
        let exec = StageExecutor::new(&fx);
        let rows = vec![
            json!({"name": "a", "price": "10"}),
            json!({"name": "b", "price": "30"}),
            json!({"name": "c", "price": "20"}),
        ];
        let stages = vec![
            Stage::Derive {
                fields: vec![NamedExpr::new(
                    "clean_price",
                    Expr::to_double(Expr::field("price"), Default::default()),
                )],
            },
            Stage::Sort {
                keys: vec![SortKey::desc("clean_price")],
            },
            Stage::Project {
                fields: vec![NamedExpr::keep("name"), NamedExpr::keep("missing")],
            },
            Stage::Limit { count: 2 },
        ];

        let out = exec.execute(rows, &stages).unwrap();

        assert_eq!(out, vec![json!({"name": "b"}), json!({"name": "c"})]);
    }
}
