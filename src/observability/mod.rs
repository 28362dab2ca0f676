//! Observability subsystem
//!
//! - Log initialisation on top of `tracing-subscriber`
//! - Scope-based begin/complete events
//! - Batch counters
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No background threads
//!
//! # Usage
//!
//! ```ignore
//! use globalmarket::observability::{self, BatchMetrics, ObservationScope};
//!
//! observability::init("info", false);
//! let metrics = BatchMetrics::new();
//! let scope = ObservationScope::with_subject("PIPELINE", "top_productos");
//! // ... do work ...
//! metrics.record_pipeline_success(15);
//! scope.complete();
//! ```

mod logger;
mod metrics;
mod scope;

pub use logger::{init, is_valid_level};
pub use metrics::{BatchMetrics, MetricsSnapshot};
pub use scope::ObservationScope;
