//! globalmarket - declarative analytics batch for the GlobalMarket retail data
//!
//! A batch runs four phases in order against a `DataSource`:
//! 1. schema validators, degraded to warn when existing data is dirty
//! 2. secondary indexes, created idempotently
//! 3. aggregation pipelines, each replacing its output collection
//! 4. a run summary read back from the outputs
//!
//! A failure in one unit is logged and the batch moves on.

pub mod cli;
pub mod executor;
pub mod index;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod store;
