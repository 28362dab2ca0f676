//! Configuration file
//!
//! A single JSON object. Only `data_dir` is required:
//!
//! ```json
//! {
//!   "data_dir": "./data",
//!   "output_dir": "./out",
//!   "products_collection": "Products_clean",
//!   "sales_collection": "ventas",
//!   "sample_size": 3,
//!   "log_level": "info",
//!   "log_json": false,
//!   "pipelines_file": "./pipelines.json"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::observability::is_valid_level;
use crate::pipeline::catalog::canonical_outputs;
use crate::pipeline::{SourceCollections, DEFAULT_SAMPLE_SIZE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory of `*.json` collection files (required)
    pub data_dir: String,

    /// Where derived collections are written as JSON, if anywhere
    #[serde(default)]
    pub output_dir: Option<String>,

    #[serde(default = "default_products_collection")]
    pub products_collection: String,

    #[serde(default = "default_sales_collection")]
    pub sales_collection: String,

    /// Rows read back after each pipeline
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Overridden by `RUST_LOG` when set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    /// Extra pipeline specs, run after the built-in ones
    #[serde(default)]
    pub pipelines_file: Option<String>,
}

fn default_products_collection() -> String {
    SourceCollections::default().products
}
fn default_sales_collection() -> String {
    SourceCollections::default().sales
}
fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }
        if self.products_collection.trim().is_empty() || self.sales_collection.trim().is_empty() {
            return Err(CliError::config_error("collection names must not be empty"));
        }
        if self.products_collection == self.sales_collection {
            return Err(CliError::config_error(
                "products_collection and sales_collection must differ",
            ));
        }
        for name in [&self.products_collection, &self.sales_collection] {
            if canonical_outputs().contains(&name.as_str()) {
                return Err(CliError::config_error(format!(
                    "'{}' is a derived collection and cannot be a source",
                    name
                )));
            }
        }
        if self.sample_size == 0 {
            return Err(CliError::config_error("sample_size must be > 0"));
        }
        if !is_valid_level(&self.log_level) {
            return Err(CliError::config_error(format!(
                "Invalid log_level: '{}'",
                self.log_level
            )));
        }
        if matches!(&self.output_dir, Some(dir) if dir.trim().is_empty()) {
            return Err(CliError::config_error("output_dir must not be empty when set"));
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_dir.as_deref().map(Path::new)
    }

    pub fn pipelines_path(&self) -> Option<&Path> {
        self.pipelines_file.as_deref().map(Path::new)
    }

    pub fn collections(&self) -> SourceCollections {
        SourceCollections::new(&self.products_collection, &self.sales_collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Config {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(json!({"data_dir": "./data"}));
        assert_eq!(config.products_collection, "Products_clean");
        assert_eq!(config.sales_collection, "ventas");
        assert_eq!(config.sample_size, 3);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert!(config.output_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_sample() {
        let config = parse(json!({"data_dir": "./data", "sample_size": 0}));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_names() {
        let config = parse(json!({"data_dir": "./data", "sales_collection": " "}));
        assert!(config.validate().is_err());
        let config = parse(json!({"data_dir": ""}));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_derived_collection_as_source() {
        let config = parse(json!({"data_dir": "./data", "sales_collection": "ventas_analytics"}));
        assert!(config.validate().is_err());
        let config = parse(json!({"data_dir": "./data", "products_collection": "top_productos"}));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accepts_target_log_directives() {
        let config = parse(json!({"data_dir": "./data", "log_level": "info,globalmarket=debug"}));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_level() {
        let config = parse(json!({"data_dir": "./data", "log_level": "loud"}));
        assert_eq!(config.validate().unwrap_err().code(), "GM_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("globalmarket.json");
        fs::write(&path, r#"{"data_dir": "./data", "sample_size": 5}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sample_size, 5);

        assert!(Config::load(&dir.path().join("missing.json")).is_err());
    }
}
