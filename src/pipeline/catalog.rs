//! The three GlobalMarket reporting pipelines
//!
//! - sales by category and month (`ventas_analytics`)
//! - top-rated products (`top_productos`)
//! - price-bucket distribution (`bucket_precios`)
//!
//! Source data is messy: ratings may be written with a decimal comma,
//! counts and prices with thousands separators. Every pipeline normalizes
//! first and lets the following filter drop what could not be parsed.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ast::{
    Accumulator, Case, Expr, FilterOp, NamedAccumulator, NamedExpr, NumberFormat, Predicate,
    SortKey, Stage,
};
use super::spec::PipelineSpec;

pub const SALES_ANALYTICS: &str = "ventas_analytics";
pub const TOP_PRODUCTS: &str = "top_productos";
pub const PRICE_BUCKETS: &str = "bucket_precios";

/// Products need more reviews than this to be ranked
pub const MIN_RATING_COUNT: i64 = 50;
pub const TOP_PRODUCTS_LIMIT: usize = 15;
pub const PRICE_BOUNDARIES: [f64; 6] = [0.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0];
/// Bucket id for prices at or above the last boundary
pub const OVERFLOW_BUCKET: &str = "Above 10000";
pub const SAMPLE_PRODUCTS: usize = 3;

/// Performance bands, highest first, with their lower rating bound
pub const PERFORMANCE_BANDS: [(f64, &str); 3] =
    [(4.5, "Excelente"), (4.0, "Bueno"), (3.0, "Regular")];
pub const PERFORMANCE_LOW: &str = "Mejorar";
pub const PERFORMANCE_UNRATED: &str = "Sin calificación";

/// Price range labels, one per bucket in boundary order, then overflow
pub const PRICE_RANGE_LABELS: [&str; 6] = [
    "Muy Bajo (0-99)",
    "Bajo (100-499)",
    "Medio (500-999)",
    "Alto (1000-4999)",
    "Muy Alto (5000-9999)",
    "Premium (10000+)",
];

/// Names of the collections the pipelines read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCollections {
    pub products: String,
    pub sales: String,
}

impl SourceCollections {
    pub fn new(products: impl Into<String>, sales: impl Into<String>) -> Self {
        Self {
            products: products.into(),
            sales: sales.into(),
        }
    }
}

impl Default for SourceCollections {
    fn default() -> Self {
        Self::new("Products_clean", "ventas")
    }
}

/// Output collections of the canonical pipelines, in run order
pub fn canonical_outputs() -> [&'static str; 3] {
    [SALES_ANALYTICS, TOP_PRODUCTS, PRICE_BUCKETS]
}

/// All canonical pipelines, in run order
pub fn canonical(collections: &SourceCollections) -> Vec<PipelineSpec> {
    vec![
        sales_by_category_month(collections),
        top_rated_products(collections),
        price_buckets(collections),
    ]
}

fn round2(expr: Expr) -> Expr {
    Expr::round(expr, 2)
}

/// Join sales to products, group by category, month and year.
///
/// Sales without a matching product are dropped by the join.
pub fn sales_by_category_month(collections: &SourceCollections) -> PipelineSpec {
    let amount = Expr::to_double(Expr::field("total_amount"), NumberFormat::Grouped);

    let stages = vec![
        Stage::Lookup {
            from: collections.products.clone(),
            local_field: "product_id".into(),
            foreign_field: "product_id".into(),
            as_field: "product_info".into(),
        },
        Stage::Group {
            key: vec![
                NamedExpr::new("category", Expr::field("product_info.category_clean")),
                NamedExpr::new("month", Expr::month(Expr::field("date"))),
                NamedExpr::new("year", Expr::year(Expr::field("date"))),
            ],
            accumulators: vec![
                NamedAccumulator::new("totalSales", Accumulator::Sum(amount.clone())),
                NamedAccumulator::new("countTransactions", Accumulator::Count),
                NamedAccumulator::new("avgTransactionValue", Accumulator::Avg(amount)),
            ],
        },
        Stage::Project {
            fields: vec![
                NamedExpr::new("category", Expr::field("_id.category")),
                NamedExpr::new("month", Expr::field("_id.month")),
                NamedExpr::new("year", Expr::field("_id.year")),
                NamedExpr::new("totalSales", round2(Expr::field("totalSales"))),
                NamedExpr::keep("countTransactions"),
                NamedExpr::new("avgTransactionValue", round2(Expr::field("avgTransactionValue"))),
            ],
        },
        Stage::Sort {
            keys: vec![
                SortKey::asc("year"),
                SortKey::asc("month"),
                SortKey::desc("totalSales"),
            ],
        },
    ];

    PipelineSpec::new(
        "sales_by_category_month",
        collections.sales.clone(),
        stages,
        SALES_ANALYTICS,
    )
}

fn performance_band(rating: Expr) -> Expr {
    let mut branches = vec![Case::new(
        rating.clone(),
        FilterOp::Eq(json!(null)),
        Expr::literal(json!(PERFORMANCE_UNRATED)),
    )];
    branches.extend(PERFORMANCE_BANDS.iter().map(|(bound, label)| {
        Case::new(rating.clone(), FilterOp::Gte(json!(bound)), Expr::literal(json!(label)))
    }));
    Expr::switch(branches, Expr::literal(json!(PERFORMANCE_LOW)))
}

/// Rank well-reviewed products by rating weighted with log10 of the
/// review count.
pub fn top_rated_products(collections: &SourceCollections) -> PipelineSpec {
    let stages = vec![
        Stage::Filter {
            predicates: vec![Predicate::not_null("rating")],
        },
        Stage::Derive {
            fields: vec![
                NamedExpr::new(
                    "clean_rating",
                    Expr::to_double(Expr::field("rating"), NumberFormat::DecimalComma),
                ),
                NamedExpr::new(
                    "clean_count",
                    Expr::to_int(Expr::field("rating_count_clean"), NumberFormat::Grouped),
                ),
            ],
        },
        Stage::Filter {
            predicates: vec![
                Predicate::gte("clean_rating", json!(0)),
                Predicate::lte("clean_rating", json!(5)),
                Predicate::gt("clean_count", json!(MIN_RATING_COUNT)),
            ],
        },
        Stage::Derive {
            fields: vec![NamedExpr::new(
                "weighted_score",
                Expr::Multiply(vec![
                    Expr::field("clean_rating"),
                    Expr::log10(Expr::Add(vec![
                        Expr::field("clean_count"),
                        Expr::literal(json!(1)),
                    ])),
                ]),
            )],
        },
        Stage::Sort {
            keys: vec![SortKey::desc("weighted_score"), SortKey::desc("clean_rating")],
        },
        Stage::Project {
            fields: vec![
                NamedExpr::keep("product_id"),
                NamedExpr::keep("product_name"),
                NamedExpr::new("rating", round2(Expr::field("clean_rating"))),
                NamedExpr::new("rating_count_clean", Expr::field("clean_count")),
                NamedExpr::new("weighted_score", round2(Expr::field("weighted_score"))),
                NamedExpr::keep("category_clean"),
                NamedExpr::keep("price"),
                NamedExpr::new("performance", performance_band(Expr::field("clean_rating"))),
            ],
        },
        Stage::Limit {
            count: TOP_PRODUCTS_LIMIT,
        },
    ];

    PipelineSpec::new(
        "top_rated_products",
        collections.products.clone(),
        stages,
        TOP_PRODUCTS,
    )
}

fn price_range_label(bucket_id: Expr) -> Expr {
    let branches = PRICE_BOUNDARIES[1..]
        .iter()
        .zip(PRICE_RANGE_LABELS)
        .map(|(upper, label)| {
            Case::new(bucket_id.clone(), FilterOp::Lt(json!(upper)), Expr::literal(json!(label)))
        })
        .collect();
    Expr::switch(branches, Expr::literal(json!(PRICE_RANGE_LABELS[5])))
}

/// Normalized rating, `null` when outside [0, 5] so averages skip it
fn rating_in_range() -> Expr {
    let rating = Expr::to_double(Expr::field("rating"), NumberFormat::DecimalComma);
    Expr::switch(
        vec![
            Case::new(rating.clone(), FilterOp::Lt(json!(0)), Expr::literal(json!(null))),
            Case::new(rating.clone(), FilterOp::Gt(json!(5)), Expr::literal(json!(null))),
        ],
        rating,
    )
}

/// Partition positively priced products into fixed price ranges.
pub fn price_buckets(collections: &SourceCollections) -> PipelineSpec {
    let stages = vec![
        Stage::Filter {
            predicates: vec![Predicate::exists("price"), Predicate::not_null("price")],
        },
        Stage::Derive {
            fields: vec![NamedExpr::new(
                "clean_price",
                Expr::to_double(Expr::field("price"), NumberFormat::Grouped),
            )],
        },
        Stage::Filter {
            predicates: vec![Predicate::gt("clean_price", json!(0))],
        },
        Stage::Bucket {
            group_by: Expr::field("clean_price"),
            boundaries: PRICE_BOUNDARIES.to_vec(),
            default: Some(OVERFLOW_BUCKET.into()),
            output: vec![
                NamedAccumulator::new("count", Accumulator::Count),
                NamedAccumulator::new("avg_price", Accumulator::Avg(Expr::field("clean_price"))),
                NamedAccumulator::new("avg_rating", Accumulator::Avg(rating_in_range())),
                NamedAccumulator::new("min_price", Accumulator::Min(Expr::field("clean_price"))),
                NamedAccumulator::new("max_price", Accumulator::Max(Expr::field("clean_price"))),
                NamedAccumulator::new(
                    "products",
                    Accumulator::Push(Expr::Object(vec![
                        NamedExpr::new("name", Expr::field("product_name")),
                        NamedExpr::new("price", Expr::field("clean_price")),
                        NamedExpr::keep("rating"),
                        NamedExpr::new("category", Expr::field("category_clean")),
                    ])),
                ),
            ],
        },
        Stage::Project {
            fields: vec![
                NamedExpr::keep("_id"),
                NamedExpr::new("price_range", price_range_label(Expr::field("_id"))),
                NamedExpr::keep("count"),
                NamedExpr::new("avg_price", round2(Expr::field("avg_price"))),
                NamedExpr::new("avg_rating", round2(Expr::field("avg_rating"))),
                NamedExpr::new("min_price", round2(Expr::field("min_price"))),
                NamedExpr::new("max_price", round2(Expr::field("max_price"))),
                NamedExpr::new("sample_products", Expr::slice(Expr::field("products"), SAMPLE_PRODUCTS)),
            ],
        },
        Stage::Sort {
            keys: vec![SortKey::asc("avg_price")],
        },
    ];

    PipelineSpec::new(
        "price_buckets",
        collections.products.clone(),
        stages,
        PRICE_BUCKETS,
    )
}
