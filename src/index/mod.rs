//! Index planning subsystem
//!
//! Declares the secondary indexes the analytics workload needs and applies
//! them idempotently through the data source. Index structures themselves
//! belong to the store.
//!
//! # Invariants
//!
//! - Index names are unique per collection
//! - Re-applying an identical index is a no-op
//! - One failed index never blocks the others

pub mod catalog;
mod errors;
mod planner;
mod spec;

pub use errors::{IndexError, IndexResult};
pub use planner::{CollectionIndexes, EnsureOutcome, IndexPlanner, IndexReport};
pub use spec::{IndexKey, IndexSpec, KeyDirection, PRIMARY_INDEX};
