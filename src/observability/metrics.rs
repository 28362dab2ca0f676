//! Batch counters
//!
//! - Counters only, monotonic within one batch
//! - Exact values, read through `snapshot()`
//! - Safe to share by reference across the driver

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one batch run
#[derive(Debug, Default)]
pub struct BatchMetrics {
    validators_applied: AtomicU64,
    validators_degraded: AtomicU64,
    validators_failed: AtomicU64,
    indexes_created: AtomicU64,
    indexes_present: AtomicU64,
    indexes_failed: AtomicU64,
    pipelines_succeeded: AtomicU64,
    pipelines_failed: AtomicU64,
    rows_written: AtomicU64,
    exports_written: AtomicU64,
    exports_failed: AtomicU64,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Validation

    /// A validator took effect; `degraded` when it fell back to warn
    pub fn record_validator(&self, degraded: bool) {
        self.validators_applied.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.validators_degraded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_validators_failed(&self) {
        self.validators_failed.fetch_add(1, Ordering::Relaxed);
    }

    // Indexes

    pub fn increment_indexes_created(&self) {
        self.indexes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_indexes_present(&self) {
        self.indexes_present.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_indexes_failed(&self) {
        self.indexes_failed.fetch_add(1, Ordering::Relaxed);
    }

    // Pipelines

    /// A pipeline completed and wrote `rows` output rows
    pub fn record_pipeline_success(&self, rows: u64) {
        self.pipelines_succeeded.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_pipelines_failed(&self) {
        self.pipelines_failed.fetch_add(1, Ordering::Relaxed);
    }

    // Exports

    pub fn increment_exports_written(&self) {
        self.exports_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_exports_failed(&self) {
        self.exports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validators_applied: self.validators_applied.load(Ordering::Relaxed),
            validators_degraded: self.validators_degraded.load(Ordering::Relaxed),
            validators_failed: self.validators_failed.load(Ordering::Relaxed),
            indexes_created: self.indexes_created.load(Ordering::Relaxed),
            indexes_present: self.indexes_present.load(Ordering::Relaxed),
            indexes_failed: self.indexes_failed.load(Ordering::Relaxed),
            pipelines_succeeded: self.pipelines_succeeded.load(Ordering::Relaxed),
            pipelines_failed: self.pipelines_failed.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            exports_written: self.exports_written.load(Ordering::Relaxed),
            exports_failed: self.exports_failed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the batch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub validators_applied: u64,
    pub validators_degraded: u64,
    pub validators_failed: u64,
    pub indexes_created: u64,
    pub indexes_present: u64,
    pub indexes_failed: u64,
    pub pipelines_succeeded: u64,
    pub pipelines_failed: u64,
    pub rows_written: u64,
    pub exports_written: u64,
    pub exports_failed: u64,
}

impl MetricsSnapshot {
    /// True when any unit of work failed
    pub fn has_failures(&self) -> bool {
        self.validators_failed > 0
            || self.indexes_failed > 0
            || self.pipelines_failed > 0
            || self.exports_failed > 0
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== BATCH STATISTICS ===")?;
        writeln!(
            f,
            "Validators: {} applied ({} degraded to warn), {} failed",
            self.validators_applied, self.validators_degraded, self.validators_failed
        )?;
        writeln!(
            f,
            "Indexes: {} created, {} already present, {} failed",
            self.indexes_created, self.indexes_present, self.indexes_failed
        )?;
        writeln!(
            f,
            "Pipelines: {} succeeded, {} failed",
            self.pipelines_succeeded, self.pipelines_failed
        )?;
        writeln!(f, "Rows written: {}", self.rows_written)?;
        writeln!(
            f,
            "Exports: {} written, {} failed",
            self.exports_written, self.exports_failed
        )
    }
}
