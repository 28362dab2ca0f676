//! Expression evaluation
//!
//! Evaluation is total: a value that cannot be normalized, a date that
//! cannot be parsed or a log of a non-positive number yields `null`.

use chrono::Datelike;
use serde_json::{Map, Value};

use super::filters::PredicateFilter;
use crate::pipeline::ast::{Expr, NumberFormat};
use crate::store::value::{as_f64, get_path, number, parse_date, round_to, set_path};

pub struct ExprEvaluator;

impl ExprEvaluator {
    /// Evaluates an expression; a missing field reads as `null`.
    pub fn evaluate(expr: &Expr, document: &Value) -> Value {
        Self::evaluate_opt(expr, document).unwrap_or(Value::Null)
    }

    /// Evaluates an expression, returning `None` for a bare reference to a
    /// missing field so callers can omit it from their output.
    pub fn evaluate_opt(expr: &Expr, document: &Value) -> Option<Value> {
        match expr {
            Expr::Field(path) => get_path(document, path).cloned(),
            Expr::Literal(value) => Some(value.clone()),
            other => Some(Self::compute(other, document)),
        }
    }

    fn compute(expr: &Expr, document: &Value) -> Value {
        match expr {
            Expr::Field(_) | Expr::Literal(_) => Self::evaluate(expr, document),
            Expr::ToDouble { input, format } => {
                normalize_number(&Self::evaluate(input, document), *format)
                    .map(number)
                    .unwrap_or(Value::Null)
            }
            Expr::ToInt { input, format } => {
                normalize_number(&Self::evaluate(input, document), *format)
                    .filter(|v| v.abs() < i64::MAX as f64)
                    .map(|v| Value::from(v.trunc() as i64))
                    .unwrap_or(Value::Null)
            }
            Expr::Month(input) => parse_date(&Self::evaluate(input, document))
                .map(|date| Value::from(date.month()))
                .unwrap_or(Value::Null),
            Expr::Year(input) => parse_date(&Self::evaluate(input, document))
                .map(|date| Value::from(date.year()))
                .unwrap_or(Value::Null),
            Expr::Add(items) => Self::fold_numeric(items, document, 0.0, |acc, v| acc + v),
            Expr::Multiply(items) => Self::fold_numeric(items, document, 1.0, |acc, v| acc * v),
            Expr::Log10(input) => as_f64(&Self::evaluate(input, document))
                .filter(|v| *v > 0.0)
                .map(|v| number(v.log10()))
                .unwrap_or(Value::Null),
            Expr::Round { input, places } => as_f64(&Self::evaluate(input, document))
                .map(|v| number(round_to(v, *places)))
                .unwrap_or(Value::Null),
            Expr::Switch { branches, default } => {
                for case in branches {
                    let value = Self::evaluate_opt(&case.input, document);
                    if PredicateFilter::matches_value(value.as_ref(), &case.op) {
                        return Self::evaluate(&case.then, document);
                    }
                }
                Self::evaluate(default, document)
            }
            Expr::Slice { input, count } => match Self::evaluate(input, document) {
                Value::Array(items) => Value::Array(items.into_iter().take(*count).collect()),
                _ => Value::Null,
            },
            Expr::Object(fields) => {
                let mut object = Map::new();
                for field in fields {
                    if let Some(value) = Self::evaluate_opt(&field.expr, document) {
                        set_path(&mut object, &field.name, value);
                    }
                }
                Value::Object(object)
            }
        }
    }

    /// Arithmetic over numbers only; any non-numeric operand gives `null`.
    fn fold_numeric(
        items: &[Expr],
        document: &Value,
        init: f64,
        op: impl Fn(f64, f64) -> f64,
    ) -> Value {
        let mut acc = init;
        for item in items {
            match as_f64(&Self::evaluate(item, document)) {
                Some(v) => acc = op(acc, v),
                None => return Value::Null,
            }
        }
        number(acc)
    }
}

/// Normalizes a possibly malformed numeric value.
///
/// Numbers pass through, booleans become 0/1, strings are cleaned
/// according to `format`. Everything else is `None`.
pub fn normalize_number(value: &Value, format: NumberFormat) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_number_str(s, format),
        _ => None,
    }
}

/// Parses a numeric string, stripping a leading currency symbol and
/// separators.
pub fn parse_number_str(raw: &str, format: NumberFormat) -> Option<f64> {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.' || c == ','));

    let cleaned: String = match format {
        NumberFormat::Plain => trimmed.trim().to_string(),
        NumberFormat::Grouped => trimmed
            .chars()
            .filter(|c| !matches!(c, ',' | ' ' | '_' | '\u{a0}'))
            .collect(),
        NumberFormat::DecimalComma => trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '\u{a0}'))
            .map(|c| if c == ',' { '.' } else { c })
            .collect(),
    };

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ast::{Case, FilterOp, NamedExpr};
    use serde_json::json;

    #[test]
    fn test_normalize_decimal_comma() {
        assert_eq!(parse_number_str("4,8", NumberFormat::DecimalComma), Some(4.8));
        assert_eq!(parse_number_str("4.2", NumberFormat::DecimalComma), Some(4.2));
    }

    #[test]
    fn test_normalize_grouped() {
        assert_eq!(parse_number_str("1,234", NumberFormat::Grouped), Some(1234.0));
        assert_eq!(parse_number_str("₹1,299.50", NumberFormat::Grouped), Some(1299.5));
        assert_eq!(parse_number_str(" 42 ", NumberFormat::Grouped), Some(42.0));
    }

    #[test]
    fn test_normalize_garbage_is_none() {
        assert_eq!(parse_number_str("n/a", NumberFormat::Grouped), None);
        assert_eq!(parse_number_str("", NumberFormat::Plain), None);
        assert_eq!(parse_number_str("1,2,3", NumberFormat::DecimalComma), None);
        assert_eq!(normalize_number(&json!(null), NumberFormat::Plain), None);
        assert_eq!(normalize_number(&json!([1]), NumberFormat::Plain), None);
    }

    #[test]
    fn test_to_int_truncates() {
        let doc = json!({"count": "1,234.9"});
        let expr = Expr::to_int(Expr::field("count"), NumberFormat::Grouped);
        assert_eq!(ExprEvaluator::evaluate(&expr, &doc), json!(1234));
    }

    #[test]
    fn test_weighted_score_expression() {
        let doc = json!({"clean_rating": 4.8, "clean_count": 120});
        let expr = Expr::Multiply(vec![
            Expr::field("clean_rating"),
            Expr::log10(Expr::Add(vec![Expr::field("clean_count"), Expr::literal(json!(1))])),
        ]);
        let score = ExprEvaluator::evaluate(&expr, &doc).as_f64().unwrap();
        assert!((score - 4.8 * 121f64.log10()).abs() < 1e-9);
        assert!((score - 9.997).abs() < 0.01);
    }

    #[test]
    fn test_arithmetic_with_null_is_null() {
        let doc = json!({"a": 1});
        let expr = Expr::Add(vec![Expr::field("a"), Expr::field("missing")]);
        assert_eq!(ExprEvaluator::evaluate(&expr, &doc), Value::Null);
    }

    #[test]
    fn test_log10_of_zero_is_null() {
        let expr = Expr::log10(Expr::literal(json!(0)));
        assert_eq!(ExprEvaluator::evaluate(&expr, &json!({})), Value::Null);
    }

    #[test]
    fn test_month_and_year() {
        let doc = json!({"date": "2024-03-15T10:30:00Z"});
        assert_eq!(ExprEvaluator::evaluate(&Expr::month(Expr::field("date")), &doc), json!(3));
        assert_eq!(ExprEvaluator::evaluate(&Expr::year(Expr::field("date")), &doc), json!(2024));

        let bad = json!({"date": "yesterday"});
        assert_eq!(ExprEvaluator::evaluate(&Expr::month(Expr::field("date")), &bad), Value::Null);
    }

    #[test]
    fn test_switch_first_match_wins() {
        let expr = Expr::switch(
            vec![
                Case::new(Expr::field("r"), FilterOp::Gte(json!(4.5)), Expr::literal(json!("high"))),
                Case::new(Expr::field("r"), FilterOp::Gte(json!(3.0)), Expr::literal(json!("mid"))),
            ],
            Expr::literal(json!("none")),
        );
        assert_eq!(ExprEvaluator::evaluate(&expr, &json!({"r": 4.7})), json!("high"));
        assert_eq!(ExprEvaluator::evaluate(&expr, &json!({"r": 3.2})), json!("mid"));
        assert_eq!(ExprEvaluator::evaluate(&expr, &json!({"r": null})), json!("none"));
    }

    #[test]
    fn test_object_omits_missing_fields() {
        let expr = Expr::Object(vec![
            NamedExpr::new("name", Expr::field("product_name")),
            NamedExpr::new("rating", Expr::field("rating")),
        ]);
        let value = ExprEvaluator::evaluate(&expr, &json!({"product_name": "Cable"}));
        assert_eq!(value, json!({"name": "Cable"}));
    }

    #[test]
    fn test_slice() {
        let expr = Expr::slice(Expr::field("items"), 3);
        let value = ExprEvaluator::evaluate(&expr, &json!({"items": [1, 2, 3, 4, 5]}));
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn test_missing_field_reference() {
        assert_eq!(ExprEvaluator::evaluate_opt(&Expr::field("x"), &json!({})), None);
        assert_eq!(ExprEvaluator::evaluate(&Expr::field("x"), &json!({})), Value::Null);
    }
}
