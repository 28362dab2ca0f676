//! Run reporting
//!
//! Purely read-only: counts the derived collections, extracts highlights
//! and audits sale-to-product references.

mod summary;

pub use summary::{Highlight, RunSummaryReporter, Summary};
