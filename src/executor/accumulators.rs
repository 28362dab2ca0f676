//! Accumulator evaluation for group and bucket stages

use serde_json::Value;

use super::expr::ExprEvaluator;
use crate::pipeline::ast::{Accumulator, Expr};
use crate::store::value::{as_f64, compare_values, number};

pub struct AccumulatorEval;

impl AccumulatorEval {
    /// Folds the rows of one group into a single value.
    pub fn evaluate(accumulator: &Accumulator, rows: &[Value]) -> Value {
        match accumulator {
            Accumulator::Count => Value::from(rows.len() as u64),
            Accumulator::Sum(expr) => number(Self::numbers(expr, rows).sum()),
            Accumulator::Avg(expr) => {
                let (sum, count) = Self::numbers(expr, rows)
                    .fold((0.0, 0u64), |(sum, count), v| (sum + v, count + 1));
                if count == 0 {
                    Value::Null
                } else {
                    number(sum / count as f64)
                }
            }
            Accumulator::Min(expr) => Self::present(expr, rows)
                .min_by(|a, b| compare_values(Some(a), Some(b)))
                .unwrap_or(Value::Null),
            Accumulator::Max(expr) => Self::present(expr, rows)
                .max_by(|a, b| compare_values(Some(a), Some(b)))
                .unwrap_or(Value::Null),
            Accumulator::Push(expr) => Value::Array(
                rows.iter()
                    .map(|row| ExprEvaluator::evaluate(expr, row))
                    .collect(),
            ),
        }
    }

    fn numbers<'a>(expr: &'a Expr, rows: &'a [Value]) -> impl Iterator<Item = f64> + 'a {
        rows.iter()
            .filter_map(move |row| as_f64(&ExprEvaluator::evaluate(expr, row)))
    }

    /// Evaluated values that are neither missing nor null
    fn present<'a>(expr: &'a Expr, rows: &'a [Value]) -> impl Iterator<Item = Value> + 'a {
        rows.iter()
            .map(move |row| ExprEvaluator::evaluate(expr, row))
            .filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"amount": 10.5, "name": "a"}),
            json!({"amount": "oops", "name": "b"}),
            json!({"amount": 4.5, "name": "c"}),
            json!({"name": "d"}),
        ]
    }

    #[test]
    fn test_sum_ignores_non_numeric() {
        let value = AccumulatorEval::evaluate(&Accumulator::Sum(Expr::field("amount")), &rows());
        assert_eq!(value, json!(15.0));
    }

    #[test]
    fn test_avg_ignores_non_numeric() {
        let value = AccumulatorEval::evaluate(&Accumulator::Avg(Expr::field("amount")), &rows());
        assert_eq!(value, json!(7.5));
    }

    #[test]
    fn test_avg_of_nothing_is_null() {
        let value = AccumulatorEval::evaluate(&Accumulator::Avg(Expr::field("amount")), &[]);
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_count_counts_rows() {
        assert_eq!(AccumulatorEval::evaluate(&Accumulator::Count, &rows()), json!(4));
    }

    #[test]
    fn test_min_max() {
        let numeric = vec![json!({"p": 3}), json!({"p": 1.5}), json!({"p": 9})];
        assert_eq!(
            AccumulatorEval::evaluate(&Accumulator::Min(Expr::field("p")), &numeric),
            json!(1.5)
        );
        assert_eq!(
            AccumulatorEval::evaluate(&Accumulator::Max(Expr::field("p")), &numeric),
            json!(9)
        );
    }

    #[test]
    fn test_push_keeps_order() {
        let value = AccumulatorEval::evaluate(&Accumulator::Push(Expr::field("name")), &rows());
        assert_eq!(value, json!(["a", "b", "c", "d"]));
    }
}
