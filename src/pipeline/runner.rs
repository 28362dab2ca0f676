//! Pipeline execution with drop-and-reload output
//!
//! For each pipeline the runner:
//! 1. executes the stages against the source's current snapshot
//! 2. drops the output collection
//! 3. inserts the produced rows one by one
//! 4. reads back a few sample rows
//!
//! There is no rollback: a failure mid-insert leaves a partial output that
//! the next run replaces entirely.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use super::errors::{PipelineError, PipelineResult};
use super::spec::PipelineSpec;
use crate::observability::ObservationScope;
use crate::store::{DataSource, ExecutionStats, FindOptions, StoreError};

/// Default number of rows read back after a run
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// Outcome of one successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub pipeline: String,
    pub output: String,
    pub row_count: u64,
    pub sample_rows: Vec<Value>,
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} row(s) written to '{}'",
            self.pipeline, self.row_count, self.output
        )?;
        for row in &self.sample_rows {
            writeln!(f, "  {}", row)?;
        }
        Ok(())
    }
}

/// Success or captured failure of one pipeline within a batch
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub pipeline: String,
    pub output: String,
    pub result: PipelineResult<RunResult>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(result) => write!(f, "{}", result),
            Err(err) => writeln!(f, "{}: FAILED [{}] {}", self.pipeline, err.code(), err),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineRunner {
    sample_size: usize,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}

impl PipelineRunner {
    pub fn new(sample_size: usize) -> Self {
        Self { sample_size }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Runs one pipeline and replaces its output collection
    pub fn run<S: DataSource + ?Sized>(
        &self,
        spec: &PipelineSpec,
        source: &mut S,
    ) -> PipelineResult<RunResult> {
        spec.validate()?;
        let scope = ObservationScope::with_subject("PIPELINE", spec.name());

        match self.execute(spec, source) {
            Ok(result) => {
                scope.complete_with(format!("{} row(s) -> {}", result.row_count, result.output));
                Ok(result)
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    fn execute<S: DataSource + ?Sized>(
        &self,
        spec: &PipelineSpec,
        source: &mut S,
    ) -> PipelineResult<RunResult> {
        let rows = source
            .aggregate(spec.source(), spec.stages())
            .map_err(|source| PipelineError::Execution {
                pipeline: spec.name().to_string(),
                source,
            })?;

        let write_error = |inserted: u64, source: StoreError| PipelineError::Write {
            pipeline: spec.name().to_string(),
            output: spec.output().to_string(),
            inserted,
            source,
        };

        source
            .drop_collection(spec.output())
            .map_err(|e| write_error(0, e))?;

        let mut inserted = 0u64;
        for row in rows {
            source
                .insert(spec.output(), row)
                .map_err(|e| write_error(inserted, e))?;
            inserted += 1;
        }

        let sample_rows = source
            .find(spec.output(), &[], &FindOptions::limit(self.sample_size))
            .map_err(|e| write_error(inserted, e))?;

        info!(
            pipeline = %spec.name(),
            output = %spec.output(),
            rows = inserted,
            "pipeline output replaced"
        );

        Ok(RunResult {
            pipeline: spec.name().to_string(),
            output: spec.output().to_string(),
            row_count: inserted,
            sample_rows,
        })
    }

    /// Runs every pipeline in order; a failed one never stops the batch
    pub fn run_all<S: DataSource + ?Sized>(
        &self,
        specs: &[PipelineSpec],
        source: &mut S,
    ) -> Vec<PipelineOutcome> {
        specs
            .iter()
            .map(|spec| {
                let result = self.run(spec, source);
                if let Err(err) = &result {
                    error!(pipeline = %spec.name(), code = err.code(), error = %err, "pipeline failed, continuing");
                }
                PipelineOutcome {
                    pipeline: spec.name().to_string(),
                    output: spec.output().to_string(),
                    result,
                }
            })
            .collect()
    }

    /// Execution statistics for a pipeline, without writing its output
    pub fn explain<S: DataSource + ?Sized>(
        &self,
        spec: &PipelineSpec,
        source: &S,
    ) -> PipelineResult<ExecutionStats> {
        spec.validate()?;
        source
            .explain(spec.source(), spec.stages())
            .map_err(|source| PipelineError::Execution {
                pipeline: spec.name().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ast::{Expr, Predicate, Stage};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .load_documents(
                "items",
                vec![
                    json!({"sku": "a", "qty": 5}),
                    json!({"sku": "b", "qty": 0}),
                    json!({"sku": "c", "qty": 9}),
                ],
            )
            .unwrap();
        store
    }

    fn in_stock() -> PipelineSpec {
        PipelineSpec::new(
            "in_stock",
            "items",
            vec![Stage::Filter {
                predicates: vec![Predicate::gt("qty", json!(0))],
            }],
            "items_in_stock",
        )
    }

    #[test]
    fn test_run_replaces_output() {
        let mut source = store();
        source
            .load_documents("items_in_stock", vec![json!({"stale": true})])
            .unwrap();

        let result = PipelineRunner::new(1).run(&in_stock(), &mut source).unwrap();
        assert_eq!(result.row_count, 2);
        assert_eq!(result.sample_rows.len(), 1);
        assert_eq!(source.count("items_in_stock", &[]).unwrap(), 2);
        assert_eq!(
            source
                .count("items_in_stock", &[Predicate::exists("stale")])
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_run_leaves_input_untouched() {
        let mut source = store();
        let before = source.find("items", &[], &FindOptions::default()).unwrap();
        PipelineRunner::default().run(&in_stock(), &mut source).unwrap();
        let after = source.find("items", &[], &FindOptions::default()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_failed_spec_does_not_stop_batch() {
        let mut source = store();
        let broken = PipelineSpec::new(
            "broken",
            "items",
            vec![Stage::Bucket {
                group_by: Expr::field("qty"),
                boundaries: vec![0.0, 1.0],
                default: None,
                output: vec![],
            }],
            "broken_out",
        );

        let outcomes = PipelineRunner::default().run_all(&[broken, in_stock()], &mut source);
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_success());
        assert!(outcomes[1].is_success());
        assert_eq!(
            outcomes[0].result.as_ref().unwrap_err().code(),
            "GM_PIPELINE_EXECUTION_FAILED"
        );
    }

    #[test]
    fn test_explain_does_not_write() {
        let source = store();
        let stats = PipelineRunner::default().explain(&in_stock(), &source).unwrap();
        assert_eq!(stats.docs_returned, 2);
        assert!(source.find("items_in_stock", &[], &FindOptions::default()).unwrap().is_empty());
    }
}
