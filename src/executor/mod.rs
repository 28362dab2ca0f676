//! Stage executor subsystem
//!
//! Interprets declarative pipeline stages over in-memory rows. This is the
//! engine behind `MemoryStore::aggregate`; other `DataSource` backends are
//! free to translate stages into their own query language instead.
//!
//! # Execution rules
//!
//! 1. Stages run strictly in declaration order
//! 2. Input rows are never mutated in place
//! 3. Malformed data becomes `null` and is dropped by later filters
//! 4. Group and bucket output order is deterministic

mod accumulators;
mod errors;
mod expr;
mod filters;
mod sorter;
mod stages;

pub use accumulators::AccumulatorEval;
pub use errors::{ExecutorError, ExecutorResult};
pub use expr::{normalize_number, parse_number_str, ExprEvaluator};
pub use filters::PredicateFilter;
pub use sorter::ResultSorter;
pub use stages::{CollectionResolver, StageExecutor};
