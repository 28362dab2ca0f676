//! Run summary
//!
//! Reads the derived collections after a batch and extracts highlights.
//! Every highlight is computed on its own: one that cannot be produced is
//! reported as unavailable and never hides the others.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;
use tracing::warn;

use crate::pipeline::ast::{Accumulator, Expr, NamedAccumulator, NamedExpr, SortKey, Stage};
use crate::pipeline::catalog::{PRICE_BUCKETS, SALES_ANALYTICS};
use crate::pipeline::SourceCollections;
use crate::store::value::{as_f64, key_string, round_to};
use crate::store::{DataSource, FindOptions};

/// A value that may not have been computable
#[derive(Debug, Clone, PartialEq)]
pub enum Highlight<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Highlight<T> {
    fn from_result(name: &str, result: Result<T, String>) -> Self {
        match result {
            Ok(value) => Highlight::Available(value),
            Err(reason) => {
                warn!(highlight = name, %reason, "highlight unavailable");
                Highlight::Unavailable(reason)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Highlight::Available(_))
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            Highlight::Available(value) => Some(value),
            Highlight::Unavailable(_) => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Highlight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Highlight::Available(value) => write!(f, "{}", value),
            Highlight::Unavailable(reason) => write!(f, "N/A ({})", reason),
        }
    }
}

/// Human-readable report of one batch
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Row count per derived collection, in the order requested
    pub counts: Vec<(String, Highlight<u64>)>,
    pub total_sales: Highlight<f64>,
    pub top_category: Highlight<String>,
    pub busiest_bucket: Highlight<String>,
    /// Sales whose product is unknown; these are silently lost by the join
    pub orphaned_sales: Highlight<u64>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== RUN SUMMARY ===")?;
        writeln!(f, "Collections:")?;
        for (i, (collection, count)) in self.counts.iter().enumerate() {
            writeln!(f, "  {}. {}: {} documents", i + 1, collection, count)?;
        }
        writeln!(f, "Highlights:")?;
        match &self.total_sales {
            Highlight::Available(total) => writeln!(f, "  Total sales analyzed: ${:.2}", total)?,
            other => writeln!(f, "  Total sales analyzed: {}", other)?,
        }
        writeln!(f, "  Top-selling category: {}", self.top_category)?;
        writeln!(f, "  Price range with most products: {}", self.busiest_bucket)?;
        writeln!(f, "Referential audit:")?;
        writeln!(f, "  Sales without a matching product: {}", self.orphaned_sales)
    }
}

pub struct RunSummaryReporter {
    collections: SourceCollections,
}

impl RunSummaryReporter {
    pub fn new(collections: SourceCollections) -> Self {
        Self { collections }
    }

    /// Counts each output and computes the highlights. Read-only.
    pub fn summarize<S: DataSource + ?Sized>(&self, outputs: &[&str], source: &S) -> Summary {
        let counts = outputs
            .iter()
            .map(|collection| {
                let count = source.count(collection, &[]).map_err(|e| e.to_string());
                (collection.to_string(), Highlight::from_result(collection, count))
            })
            .collect();

        Summary {
            counts,
            total_sales: Highlight::from_result("total_sales", Self::total_sales(source)),
            top_category: Highlight::from_result("top_category", Self::top_category(source)),
            busiest_bucket: Highlight::from_result("busiest_bucket", Self::busiest_bucket(source)),
            orphaned_sales: self.referential_audit(source),
        }
    }

    /// Sales whose product is unknown, on their own
    pub fn referential_audit<S: DataSource + ?Sized>(&self, source: &S) -> Highlight<u64> {
        Highlight::from_result("orphaned_sales", self.orphaned_sales(source))
    }

    fn total_sales<S: DataSource + ?Sized>(source: &S) -> Result<f64, String> {
        let rows = source
            .find(SALES_ANALYTICS, &[], &FindOptions::default())
            .map_err(|e| e.to_string())?;
        if rows.is_empty() {
            return Err(format!("'{}' is empty", SALES_ANALYTICS));
        }
        let total: f64 = rows
            .iter()
            .filter_map(|row| row.get("totalSales").and_then(as_f64))
            .sum();
        Ok(round_to(total, 2))
    }

    /// Category with the largest total across all months.
    ///
    /// The per-category sum is what is ranked, not the single largest
    /// category-month row: a category selling steadily every month beats
    /// one with a single strong month.
    fn top_category<S: DataSource + ?Sized>(source: &S) -> Result<String, String> {
        let stages = [
            Stage::Group {
                key: vec![NamedExpr::keep("category")],
                accumulators: vec![NamedAccumulator::new(
                    "total",
                    Accumulator::Sum(Expr::field("totalSales")),
                )],
            },
            Stage::Sort {
                keys: vec![SortKey::desc("total")],
            },
            Stage::Limit { count: 1 },
        ];
        let rows = source
            .aggregate(SALES_ANALYTICS, &stages)
            .map_err(|e| e.to_string())?;
        let top = rows
            .first()
            .ok_or_else(|| format!("'{}' is empty", SALES_ANALYTICS))?;

        match top.pointer("/_id/category") {
            Some(Value::String(category)) => Ok(category.clone()),
            Some(Value::Null) | None => Err("top group has no category".into()),
            Some(other) => Ok(other.to_string()),
        }
    }

    fn busiest_bucket<S: DataSource + ?Sized>(source: &S) -> Result<String, String> {
        let options = FindOptions::limit(1).with_sort(SortKey::desc("count"));
        let rows = source
            .find(PRICE_BUCKETS, &[], &options)
            .map_err(|e| e.to_string())?;
        rows.first()
            .and_then(|row| row.get("price_range"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| format!("'{}' has no labelled bucket", PRICE_BUCKETS))
    }

    fn orphaned_sales<S: DataSource + ?Sized>(&self, source: &S) -> Result<u64, String> {
        let all = FindOptions::default();
        let products = source
            .find(&self.collections.products, &[], &all)
            .map_err(|e| e.to_string())?;
        let sales = source
            .find(&self.collections.sales, &[], &all)
            .map_err(|e| e.to_string())?;

        let known: HashSet<String> = products
            .iter()
            .filter_map(|p| p.get("product_id"))
            .filter(|id| !id.is_null())
            .map(key_string)
            .collect();

        let orphans = sales
            .iter()
            .filter(|sale| match sale.get("product_id") {
                Some(id) if !id.is_null() => !known.contains(&key_string(id)),
                _ => true,
            })
            .count();
        Ok(orphans as u64)
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
            .load_documents(
                SALES_ANALYTICS,
                vec![
                    json!({"category": "Audio", "month": 1, "year": 2024, "totalSales": 100.5}),
                    json!({"category": "Cables", "month": 1, "year": 2024, "totalSales": 150.0}),
                    json!({"category": "Audio", "month": 2, "year": 2024, "totalSales": 80.25}),
                ],
            )
            .unwrap();
        store
            .load_documents(
                PRICE_BUCKETS,
                vec![
                    json!({"_id": 0, "price_range": "Muy Bajo (0-99)", "count": 2}),
                    json!({"_id": 100, "price_range": "Bajo (100-499)", "count": 5}),
                ],
            )
            .unwrap();
        store
            .load_documents("Products_clean", vec![json!({"product_id": "P1"})])
            .unwrap();
        store
            .load_documents(
                "ventas",
                vec![
                    json!({"product_id": "P1"}),
                    json!({"product_id": "P9"}),
                    json!({"total_amount": 3}),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_highlights() {
        let reporter = RunSummaryReporter::new(SourceCollections::default());
        let summary = reporter.summarize(&[SALES_ANALYTICS, PRICE_BUCKETS], &store());

        assert_eq!(summary.counts[0], (SALES_ANALYTICS.to_string(), Highlight::Available(3)));
        assert_eq!(summary.total_sales, Highlight::Available(330.75));
        assert_eq!(summary.top_category, Highlight::Available("Audio".to_string()));
        assert_eq!(
            summary.busiest_bucket,
            Highlight::Available("Bajo (100-499)".to_string())
        );
        assert_eq!(summary.orphaned_sales, Highlight::Available(2));
    }

    #[test]
    fn test_missing_outputs_are_unavailable_independently() {
        let mut source = store();
        source.drop_collection(SALES_ANALYTICS).unwrap();

        let reporter = RunSummaryReporter::new(SourceCollections::default());
        let summary = reporter.summarize(&[SALES_ANALYTICS], &source);

        assert_eq!(summary.counts[0].1, Highlight::Available(0));
        assert!(!summary.total_sales.is_available());
        assert!(!summary.top_category.is_available());
        assert!(summary.busiest_bucket.is_available());
    }

    #[test]
    fn test_top_category_sums_months() {
        let mut source = MemoryStore::new();
        source
            .load_documents(
                SALES_ANALYTICS,
                vec![
                    json!({"category": "Hogar", "month": 1, "year": 2024, "totalSales": 500.0}),
                    json!({"category": "Audio", "month": 1, "year": 2024, "totalSales": 300.0}),
                    json!({"category": "Audio", "month": 2, "year": 2024, "totalSales": 300.0}),
                ],
            )
            .unwrap();

        let reporter = RunSummaryReporter::new(SourceCollections::default());
        let summary = reporter.summarize(&[SALES_ANALYTICS], &source);
        assert_eq!(summary.top_category, Highlight::Available("Audio".to_string()));
    }

    #[test]
    fn test_display() {
        let reporter = RunSummaryReporter::new(SourceCollections::default());
        let text = reporter.summarize(&[SALES_ANALYTICS], &store()).to_string();
        assert!(text.starts_with("=== RUN SUMMARY ==="));
        assert!(text.contains("1. ventas_analytics: 3 documents"));
        assert!(text.contains("Total sales analyzed: $330.75"));
        assert!(text.contains("Top-selling category: Audio"));
    }
}
