//! CLI command implementations
//!
//! Every command follows the same boot sequence:
//! 1. load and validate configuration
//! 2. initialise logging
//! 3. load the data directory into a `MemoryStore`
//!
//! The batch then runs strictly in order: validation setup, index setup,
//! pipelines, summary. Failures inside a phase are recorded and the batch
//! moves on.

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{error, info, warn};

use crate::index::catalog::globalmarket_indexes;
use crate::index::{CollectionIndexes, EnsureOutcome, IndexPlanner, IndexReport};
use crate::observability::{self, BatchMetrics, MetricsSnapshot, ObservationScope};
use crate::pipeline::catalog::canonical;
use crate::pipeline::{PipelineOutcome, PipelineRunner, PipelineSpec, SourceCollections};
use crate::report::{RunSummaryReporter, Summary};
use crate::schema::catalog::{products_validation, sales_validation, sample_product, sample_sale};
use crate::schema::{ApplyResult, AuditReport, SchemaResult, SchemaValidator, ValidationSpec};
use crate::store::MemoryStore;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{write_section, write_text};

/// Result of applying one validator and, when applied, its self-test
#[derive(Debug, Clone)]
pub struct ValidatorReport {
    pub collection: String,
    pub applied: SchemaResult<ApplyResult>,
    pub self_test: Option<SchemaResult<()>>,
}

impl fmt::Display for ValidatorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.applied {
            Ok(result) => write!(f, "{}", result)?,
            Err(err) => write!(f, "{}: FAILED [{}] {}", self.collection, err.code(), err)?,
        }
        match &self.self_test {
            Some(Ok(())) => write!(f, ", self-test passed"),
            Some(Err(err)) => write!(f, ", self-test FAILED: {}", err),
            None => Ok(()),
        }
    }
}

/// Everything one batch produced
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub validators: Vec<ValidatorReport>,
    pub indexes: Vec<IndexReport>,
    pub pipelines: Vec<PipelineOutcome>,
    pub summary: Summary,
    pub metrics: MetricsSnapshot,
}

/// Loaded configuration and data
pub struct Session {
    pub config: Config,
    pub store: MemoryStore,
}

impl Session {
    /// Boots from a configuration file and installs logging
    pub fn boot(config_path: &Path) -> CliResult<Self> {
        let config = Config::load(config_path)?;
        observability::init(&config.log_level, config.log_json);
        Self::open(config)
    }

    /// Loads the data directory named by an already validated config
    pub fn open(config: Config) -> CliResult<Self> {
        let scope = ObservationScope::with_subject("DATA_LOAD", &config.data_dir);
        let mut store = MemoryStore::new();
        match store.load_dir(config.data_path()) {
            Ok(loaded) => {
                scope.complete_with(format!("{} collection(s)", loaded.len()));
            }
            Err(err) => {
                scope.fail(&err);
                return Err(CliError::DataLoad(err));
            }
        }

        let collections = config.collections();
        for name in [&collections.products, &collections.sales] {
            if !store.has_collection(name) {
                warn!(collection = %name, "source collection not found in data directory");
            }
        }
        Ok(Self { config, store })
    }

    pub fn collections(&self) -> SourceCollections {
        self.config.collections()
    }

    fn validation_specs(&self) -> Vec<(ValidationSpec, serde_json::Value)> {
        let collections = self.collections();
        vec![
            (products_validation(&collections.products), sample_product()),
            (sales_validation(&collections.sales), sample_sale()),
        ]
    }

    /// Applies every validator, self-testing those that took effect
    pub fn setup_validation(&mut self, metrics: &BatchMetrics) -> Vec<ValidatorReport> {
        let scope = ObservationScope::new("VALIDATION_SETUP");
        let reports: Vec<ValidatorReport> = self
            .validation_specs()
            .into_iter()
            .map(|(spec, sample)| {
                let applied = SchemaValidator::apply(&spec, &mut self.store);
                let self_test = match &applied {
                    Ok(result) => {
                        metrics.record_validator(result.degraded());
                        Some(SchemaValidator::self_test(&spec, &mut self.store, &sample))
                    }
                    Err(err) => {
                        metrics.increment_validators_failed();
                        error!(collection = %spec.collection, code = err.code(), error = %err, "validator not applied");
                        None
                    }
                };
                if let Some(Err(err)) = &self_test {
                    warn!(collection = %spec.collection, error = %err, "validator self-test failed");
                }
                ValidatorReport {
                    collection: spec.collection.clone(),
                    applied,
                    self_test,
                }
            })
            .collect();
        scope.complete();
        reports
    }

    /// Creates the catalog indexes, isolating failures
    pub fn setup_indexes(&mut self, metrics: &BatchMetrics) -> Vec<IndexReport> {
        let specs = globalmarket_indexes(&self.collections());
        let reports = IndexPlanner::ensure_all(&specs, &mut self.store);
        for report in &reports {
            match report.outcome {
                Ok(EnsureOutcome::Created) => metrics.increment_indexes_created(),
                Ok(EnsureOutcome::AlreadyPresent) => metrics.increment_indexes_present(),
                Err(_) => metrics.increment_indexes_failed(),
            }
        }
        reports
    }

    /// Built-in pipelines followed by those of `pipelines_file`
    pub fn pipeline_specs(&self, metrics: &BatchMetrics) -> Vec<PipelineSpec> {
        let mut specs = canonical(&self.collections());
        if let Some(path) = self.config.pipelines_path() {
            match PipelineSpec::load_all(path) {
                Ok(extra) => {
                    info!(path = %path.display(), pipelines = extra.len(), "extra pipelines loaded");
                    specs.extend(extra);
                }
                Err(err) => {
                    metrics.increment_pipelines_failed();
                    error!(code = err.code(), error = %err, "extra pipelines skipped");
                }
            }
        }
        specs
    }

    pub fn run_pipelines(&mut self, specs: &[PipelineSpec], metrics: &BatchMetrics) -> Vec<PipelineOutcome> {
        let runner = PipelineRunner::new(self.config.sample_size);
        let outcomes = runner.run_all(specs, &mut self.store);
        for outcome in &outcomes {
            match &outcome.result {
                Ok(result) => metrics.record_pipeline_success(result.row_count),
                Err(_) => metrics.increment_pipelines_failed(),
            }
        }
        outcomes
    }

    /// Writes every successful output to `output_dir`, when configured.
    ///
    /// An output with no rows no longer exists after its reload and is
    /// written as an empty array, so no file from an earlier run survives.
    /// A failed write is logged and counted; the other outputs still go out.
    pub fn export_outputs(&self, outcomes: &[PipelineOutcome], metrics: &BatchMetrics) -> usize {
        let Some(dir) = self.config.output_path() else {
            return 0;
        };

        let scope = ObservationScope::with_subject("EXPORT", dir.display().to_string());
        let mut attempted = 0;
        let mut exported = 0;
        for outcome in outcomes.iter().filter(|o| o.is_success()) {
            attempted += 1;
            let path = dir.join(format!("{}.json", outcome.output));
            match self.export_output(&outcome.output, &path) {
                Ok(rows) => {
                    metrics.increment_exports_written();
                    info!(collection = %outcome.output, path = %path.display(), rows, "output exported");
                    exported += 1;
                }
                Err(err) => {
                    metrics.increment_exports_failed();
                    error!(
                        collection = %outcome.output,
                        path = %path.display(),
                        code = err.code(),
                        error = %err,
                        "output not exported, continuing"
                    );
                }
            }
        }
        scope.complete_with(format!("{} of {} exported", exported, attempted));
        exported
    }

    fn export_output(&self, collection: &str, path: &Path) -> CliResult<usize> {
        if self.store.has_collection(collection) {
            return self
                .store
                .export_collection(collection, path)
                .map_err(CliError::Export);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, "[]")?;
        Ok(0)
    }

    pub fn summarize(&self, outcomes: &[PipelineOutcome]) -> Summary {
        let outputs: Vec<&str> = outcomes.iter().map(|o| o.output.as_str()).collect();
        RunSummaryReporter::new(self.collections()).summarize(&outputs, &self.store)
    }

    /// Runs the whole batch in order. Every phase reports its own
    /// failures, so a batch always ends with a summary.
    pub fn run_batch(&mut self) -> BatchReport {
        let scope = ObservationScope::new("BATCH");
        let metrics = BatchMetrics::new();

        let validators = self.setup_validation(&metrics);
        let indexes = self.setup_indexes(&metrics);
        let specs = self.pipeline_specs(&metrics);
        let pipelines = self.run_pipelines(&specs, &metrics);
        self.export_outputs(&pipelines, &metrics);
        let summary = self.summarize(&pipelines);

        let metrics = metrics.snapshot();
        if metrics.has_failures() {
            scope.complete_with("completed with failures");
        } else {
            scope.complete();
        }

        BatchReport {
            validators,
            indexes,
            pipelines,
            summary,
            metrics,
        }
    }

    pub fn verify_indexes(&self) -> Vec<CollectionIndexes> {
        let collections = self.collections();
        IndexPlanner::verify(&[&collections.products, &collections.sales], &self.store)
    }

    /// Audits existing data against every validator, without applying them
    pub fn audit(&self) -> Vec<SchemaResult<AuditReport>> {
        self.validation_specs()
            .iter()
            .map(|(spec, _)| SchemaValidator::audit(spec, &self.store))
            .collect()
    }
}

fn result_lines<T: fmt::Display>(results: &[SchemaResult<T>]) -> Vec<String> {
    results
        .iter()
        .map(|r| match r {
            Ok(value) => value.to_string(),
            Err(err) => format!("FAILED [{}] {}", err.code(), err),
        })
        .collect()
}

/// `run`: the whole batch
pub fn run_all(config_path: &Path) -> CliResult<()> {
    let mut session = Session::boot(config_path)?;
    let report = session.run_batch();

    write_section("VALIDATION", &report.validators)?;
    write_section("INDEXES", &report.indexes)?;
    write_section("INDEX VERIFICATION", &session.verify_indexes())?;
    write_section("PIPELINES", &report.pipelines)?;
    write_text(&report.summary)?;
    write_text(&report.metrics)?;
    Ok(())
}

/// `validate`: validators and self-tests only
pub fn validate(config_path: &Path) -> CliResult<()> {
    let mut session = Session::boot(config_path)?;
    let metrics = BatchMetrics::new();
    let reports = session.setup_validation(&metrics);
    write_section("VALIDATION", &reports)?;
    write_text(&metrics.snapshot())?;
    Ok(())
}

/// `index`: index setup and verification
pub fn index(config_path: &Path) -> CliResult<()> {
    let mut session = Session::boot(config_path)?;
    let metrics = BatchMetrics::new();
    let reports = session.setup_indexes(&metrics);
    write_section("INDEXES", &reports)?;
    write_section("INDEX VERIFICATION", &session.verify_indexes())?;
    write_text(&metrics.snapshot())?;
    Ok(())
}

/// `aggregate`: pipelines, export and summary
pub fn aggregate(config_path: &Path) -> CliResult<()> {
    let mut session = Session::boot(config_path)?;
    let metrics = BatchMetrics::new();
    let specs = session.pipeline_specs(&metrics);
    let outcomes = session.run_pipelines(&specs, &metrics);
    session.export_outputs(&outcomes, &metrics);
    write_section("PIPELINES", &outcomes)?;
    write_text(&session.summarize(&outcomes))?;
    write_text(&metrics.snapshot())?;
    Ok(())
}

/// `explain`: execution statistics with the catalog indexes in place
pub fn explain(config_path: &Path) -> CliResult<()> {
    let mut session = Session::boot(config_path)?;
    let metrics = BatchMetrics::new();
    session.setup_indexes(&metrics);

    let runner = PipelineRunner::new(session.config.sample_size);
    for spec in session.pipeline_specs(&metrics) {
        let title = format!("EXPLAIN {}", spec.name());
        match runner.explain(&spec, &session.store) {
            Ok(stats) => write_section(&title, &[stats])?,
            Err(err) => write_section(&title, &[format!("FAILED [{}] {}", err.code(), err)])?,
        }
    }
    Ok(())
}

/// `audit`: data quality against the validators, plus index listing
pub fn audit(config_path: &Path) -> CliResult<()> {
    let session = Session::boot(config_path)?;
    let audits = session.audit();
    write_section("DATA AUDIT", &result_lines(audits.as_slice()))?;
    write_section("INDEX VERIFICATION", &session.verify_indexes())?;

    let orphans = RunSummaryReporter::new(session.collections()).referential_audit(&session.store);
    write_section(
        "REFERENTIAL AUDIT",
        &[format!("Sales without a matching product: {}", orphans)],
    )?;
    Ok(())
}

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Run { config } => run_all(&config),
        Command::Validate { config } => validate(&config),
        Command::Index { config } => index(&config),
        Command::Aggregate { config } => aggregate(&config),
        Command::Explain { config } => explain(&config),
        Command::Audit { config } => audit(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn config_for(data_dir: &Path) -> Config {
        serde_json::from_value(json!({"data_dir": data_dir.display().to_string()})).unwrap()
    }

    fn write_data(dir: &Path) {
        fs::write(
            dir.join("Products_clean.json"),
            json!([
                {"product_id": "P1", "product_name": "Cable", "price": 120.0,
                 "rating": 4.6, "rating_count_clean": 200, "category_clean": "Cables"}
            ])
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.join("ventas.json"),
            json!([
                {"product_id": "P1", "date": "2024-03-01", "total_amount": 240.0}
            ])
            .to_string(),
        )
        .unwrap();
    }

    #[test]
    fn test_open_fails_on_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::open(config_for(&dir.path().join("nope"))).err().unwrap();
        assert_eq!(err.code(), "GM_CLI_DATA_LOAD_FAILED");
    }

    #[test]
    fn test_batch_on_clean_data() {
        let dir = tempfile::tempdir().unwrap();
        write_data(dir.path());

        let mut session = Session::open(config_for(dir.path())).unwrap();
        let report = session.run_batch();

        assert!(report.validators.iter().all(|v| v.applied.is_ok()));
        assert!(report.indexes.iter().all(|i| i.outcome.is_ok()));
        assert_eq!(report.pipelines.len(), 3);
        assert!(report.pipelines.iter().all(|p| p.is_success()));
        assert_eq!(report.metrics.indexes_created, 9);
        assert_eq!(report.metrics.validators_degraded, 0);
        assert!(!report.metrics.has_failures());
    }

    #[test]
    fn test_export_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        write_data(dir.path());
        let out = dir.path().join("out");

        let mut config = config_for(dir.path());
        config.output_dir = Some(out.display().to_string());
        let mut session = Session::open(config).unwrap();
        session.run_batch();

        assert!(out.join("ventas_analytics.json").exists());
        assert!(out.join("top_productos.json").exists());
        assert!(out.join("bucket_precios.json").exists());
    }

    #[test]
    fn test_bad_pipelines_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_data(dir.path());
        let extra = dir.path().join("extra.txt");
        fs::write(&extra, "not json").unwrap();

        let mut config = config_for(dir.path());
        config.pipelines_file = Some(extra.display().to_string());
        let mut session = Session::open(config).unwrap();
        let report = session.run_batch();

        assert_eq!(report.pipelines.len(), 3);
        assert_eq!(report.metrics.pipelines_failed, 1);
    }
}
