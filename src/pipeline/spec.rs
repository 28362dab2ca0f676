//! Pipeline definitions
//!
//! A `PipelineSpec` is immutable once built: a name, the collection it
//! reads, its ordered stages and the collection it owns as output.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ast::Stage;
use super::errors::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    name: String,
    source: String,
    stages: Vec<Stage>,
    output: String,
}

impl PipelineSpec {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        stages: Vec<Stage>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            stages,
            output: output.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection the stages read from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Collection replaced by every run
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Checks the definition without touching any data
    pub fn validate(&self) -> PipelineResult<()> {
        let invalid = |reason: &str| PipelineError::InvalidSpec {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.source.trim().is_empty() {
            return Err(invalid("source collection must not be empty"));
        }
        if self.output.trim().is_empty() {
            return Err(invalid("output collection must not be empty"));
        }
        if self.output == self.source {
            return Err(invalid("output must differ from the source collection"));
        }
        if self.stages.is_empty() {
            return Err(invalid("at least one stage is required"));
        }

        for stage in &self.stages {
            match stage {
                Stage::Bucket { boundaries, .. }
                    if boundaries.len() < 2 || boundaries.windows(2).any(|w| w[0] >= w[1]) =>
                {
                    return Err(invalid("bucket boundaries must be ascending with at least two values"));
                }
                Stage::Lookup { from, as_field, .. }
                    if from.trim().is_empty() || as_field.trim().is_empty() =>
                {
                    return Err(invalid("lookup needs a collection and a target field"));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Reads a JSON array of specs and validates each one
    pub fn load_all(path: &Path) -> PipelineResult<Vec<PipelineSpec>> {
        let load_error = |reason: String| PipelineError::Load {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let specs: Vec<PipelineSpec> =
            serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;

        for spec in &specs {
            spec.validate()?;
        }
        Ok(specs)
    }
}

impl fmt::Display for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages = self
            .stages
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" -> ");
        write!(f, "{}: {} [{}] => {}", self.name, self.source, stages, self.output)
    }
}
