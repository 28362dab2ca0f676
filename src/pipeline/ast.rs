//! Declarative pipeline structures.
//!
//! Stages, expressions and predicates are plain data: they serialize to
//! JSON (`{"stage": "filter", ...}`) and carry no backend query syntax, so
//! any `DataSource` can interpret them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter operation types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Equality; `Eq(null)` also matches a missing field
    Eq(Value),
    /// Not equal; `Ne(null)` matches present, non-null fields
    Ne(Value),
    /// Greater than
    Gt(Value),
    /// Greater than or equal
    Gte(Value),
    /// Less than
    Lt(Value),
    /// Less than or equal
    Lte(Value),
    /// Field presence (`true`) or absence (`false`)
    Exists(bool),
}

impl FilterOp {
    /// Returns the operation name for explain output
    pub fn op_name(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "eq",
            FilterOp::Ne(_) => "ne",
            FilterOp::Gt(_) => "gt",
            FilterOp::Gte(_) => "gte",
            FilterOp::Lt(_) => "lt",
            FilterOp::Lte(_) => "lte",
            FilterOp::Exists(_) => "exists",
        }
    }

    fn operand(&self) -> Value {
        match self {
            FilterOp::Eq(v)
            | FilterOp::Ne(v)
            | FilterOp::Gt(v)
            | FilterOp::Gte(v)
            | FilterOp::Lt(v)
            | FilterOp::Lte(v) => v.clone(),
            FilterOp::Exists(flag) => Value::Bool(*flag),
        }
    }
}

/// A single predicate (field + operation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Dotted field path
    pub field: String,
    /// Filter operation
    pub op: FilterOp,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq(value))
    }

    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Ne(value))
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gt(value))
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gte(value))
    }

    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lt(value))
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lte(value))
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, FilterOp::Exists(true))
    }

    /// Present and not null
    pub fn not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOp::Ne(Value::Null))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op.op_name(), self.op.operand())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One sort key; stages sort by several keys in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// How numeric strings are written in the source data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// `1234.5`
    #[default]
    Plain,
    /// `1,234.5`: commas are thousands separators
    Grouped,
    /// `4,8`: the comma is the decimal mark
    DecimalComma,
}

/// Computed value expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Dotted field reference
    Field(String),
    /// Constant
    Literal(Value),
    /// Numeric normalization to a float; unparseable input yields `null`
    ToDouble {
        input: Box<Expr>,
        #[serde(default)]
        format: NumberFormat,
    },
    /// Numeric normalization to an integer (truncating)
    ToInt {
        input: Box<Expr>,
        #[serde(default)]
        format: NumberFormat,
    },
    /// Calendar month (1-12) of a date
    Month(Box<Expr>),
    /// Calendar year of a date
    Year(Box<Expr>),
    Add(Vec<Expr>),
    Multiply(Vec<Expr>),
    /// Base-10 logarithm; non-positive input yields `null`
    Log10(Box<Expr>),
    Round {
        input: Box<Expr>,
        places: u32,
    },
    /// First matching case wins, otherwise `default`
    Switch {
        branches: Vec<Case>,
        default: Box<Expr>,
    },
    /// First `count` elements of an array
    Slice {
        input: Box<Expr>,
        count: usize,
    },
    /// Builds an embedded document; missing fields are omitted
    Object(Vec<NamedExpr>),
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(path.into())
    }

    pub fn literal(value: Value) -> Self {
        Expr::Literal(value)
    }

    pub fn to_double(input: Expr, format: NumberFormat) -> Self {
        Expr::ToDouble {
            input: Box::new(input),
            format,
        }
    }

    pub fn to_int(input: Expr, format: NumberFormat) -> Self {
        Expr::ToInt {
            input: Box::new(input),
            format,
        }
    }

    pub fn month(input: Expr) -> Self {
        Expr::Month(Box::new(input))
    }

    pub fn year(input: Expr) -> Self {
        Expr::Year(Box::new(input))
    }

    pub fn log10(input: Expr) -> Self {
        Expr::Log10(Box::new(input))
    }

    pub fn round(input: Expr, places: u32) -> Self {
        Expr::Round {
            input: Box::new(input),
            places,
        }
    }

    pub fn switch(branches: Vec<Case>, default: Expr) -> Self {
        Expr::Switch {
            branches,
            default: Box::new(default),
        }
    }

    pub fn slice(input: Expr, count: usize) -> Self {
        Expr::Slice {
            input: Box::new(input),
            count,
        }
    }
}

/// A `Switch` branch: `then` applies when `input` satisfies `op`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub input: Expr,
    pub op: FilterOp,
    pub then: Expr,
}

impl Case {
    pub fn new(input: Expr, op: FilterOp, then: Expr) -> Self {
        Self { input, op, then }
    }
}

/// An output field name bound to an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpr {
    pub name: String,
    pub expr: Expr,
}

impl NamedExpr {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }

    /// Keeps a field under its own name
    pub fn keep(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            expr: Expr::Field(field.clone()),
            name: field,
        }
    }
}

/// Group and bucket accumulators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulator {
    /// Sum of numeric values (others ignored)
    Sum(Expr),
    /// Number of rows
    Count,
    /// Mean of numeric values, `null` when there are none
    Avg(Expr),
    Min(Expr),
    Max(Expr),
    /// Collects every evaluated value into an array
    Push(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAccumulator {
    pub name: String,
    pub accumulator: Accumulator,
}

impl NamedAccumulator {
    pub fn new(name: impl Into<String>, accumulator: Accumulator) -> Self {
        Self {
            name: name.into(),
            accumulator,
        }
    }
}

/// One declarative transformation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Keep rows matching every predicate
    Filter { predicates: Vec<Predicate> },
    /// Inner join: one output row per match, embedded under `as`.
    /// Rows without a match are dropped.
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        #[serde(rename = "as")]
        as_field: String,
    },
    /// Add or overwrite computed fields
    Derive { fields: Vec<NamedExpr> },
    /// Group by a compound key into `_id`
    Group {
        key: Vec<NamedExpr>,
        accumulators: Vec<NamedAccumulator>,
    },
    /// Partition by `[lower, upper)` boundaries; values outside go to `default`
    Bucket {
        group_by: Expr,
        boundaries: Vec<f64>,
        #[serde(default)]
        default: Option<String>,
        output: Vec<NamedAccumulator>,
    },
    Sort { keys: Vec<SortKey> },
    /// Replace each row with exactly the listed fields
    Project { fields: Vec<NamedExpr> },
    Limit { count: usize },
}

impl Stage {
    /// Stage name for explain output
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Filter { .. } => "FILTER",
            Stage::Lookup { .. } => "LOOKUP",
            Stage::Derive { .. } => "DERIVE",
            Stage::Group { .. } => "GROUP",
            Stage::Bucket { .. } => "BUCKET",
            Stage::Sort { .. } => "SORT",
            Stage::Project { .. } => "PROJECT",
            Stage::Limit { .. } => "LIMIT",
        }
    }
}
