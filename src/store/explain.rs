//! Execution statistics returned by `DataSource::explain`
//!
//! Produces deterministic, human-readable explain output.

use std::fmt;

use serde::Serialize;

/// Access path that feeds a pipeline
pub const INDEX_SCAN: &str = "IXSCAN";
pub const COLLECTION_SCAN: &str = "COLLSCAN";

/// One node of the stage tree; `input` points towards the access path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageNode {
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Box<StageNode>>,
}

impl StageNode {
    pub fn leaf(stage: impl Into<String>, index: Option<String>) -> Self {
        Self {
            stage: stage.into(),
            index,
            input: None,
        }
    }

    pub fn wrap(stage: impl Into<String>, input: StageNode) -> Self {
        Self {
            stage: stage.into(),
            index: None,
            input: Some(Box::new(input)),
        }
    }

    /// The access-path node at the bottom of the tree
    pub fn access_path(&self) -> &StageNode {
        let mut node = self;
        while let Some(input) = &node.input {
            node = input;
        }
        node
    }

    /// Stage names from the access path up to the root
    pub fn stages_bottom_up(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut node = Some(self);
        while let Some(current) = node {
            names.push(current.stage.as_str());
            node = current.input.as_deref();
        }
        names.reverse();
        names
    }
}

/// Execution statistics for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub time_millis: u64,
    pub docs_examined: u64,
    pub docs_returned: u64,
    pub stage_tree: StageNode,
}

impl ExecutionStats {
    /// True when the access path is an index scan
    pub fn uses_index(&self) -> bool {
        self.stage_tree.access_path().stage == INDEX_SCAN
    }
}

impl fmt::Display for ExecutionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN ===")?;
        writeln!(f, "Execution time: {} ms", self.time_millis)?;
        writeln!(f, "Documents examined: {}", self.docs_examined)?;
        writeln!(f, "Documents returned: {}", self.docs_returned)?;
        writeln!(f, "Stages: {}", self.stage_tree.stages_bottom_up().join(" -> "))?;
        match &self.stage_tree.access_path().index {
            Some(index) => writeln!(f, "Uses index: yes ({})", index)?,
            None => writeln!(f, "Uses index: no")?,
        }
        Ok(())
    }
}
