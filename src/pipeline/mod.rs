//! Declarative analytics pipelines
//!
//! Pipelines are data: named lists of tagged stages that any `DataSource`
//! can interpret. The runner owns each pipeline's output collection and
//! replaces it completely on every run.
//!
//! # Guarantees
//!
//! - Inputs are read-only
//! - Re-running with unchanged inputs produces identical outputs
//! - One failing pipeline never aborts the batch

pub mod ast;
pub mod catalog;
mod errors;
mod runner;
mod spec;

pub use catalog::SourceCollections;
pub use errors::{PipelineError, PipelineResult};
pub use runner::{PipelineOutcome, PipelineRunner, RunResult, DEFAULT_SAMPLE_SIZE};
pub use spec::PipelineSpec;
