//! CLI error types
//!
//! Only configuration and data loading stop the process. Everything after
//! that is reported and the batch continues.

use std::io;

use thiserror::Error;

use crate::store::StoreError;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load data: {0}")]
    DataLoad(#[source] StoreError),

    #[error("Failed to write output: {0}")]
    Export(#[source] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        CliError::Config(msg.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "GM_CLI_CONFIG_ERROR",
            CliError::DataLoad(_) => "GM_CLI_DATA_LOAD_FAILED",
            CliError::Export(_) => "GM_CLI_EXPORT_FAILED",
            CliError::Io(_) => "GM_CLI_IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config_error("sample_size must be > 0");
        assert_eq!(err.code(), "GM_CLI_CONFIG_ERROR");
        assert_eq!(err.to_string(), "Configuration error: sample_size must be > 0");
    }

    #[test]
    fn test_data_load_error() {
        let err = CliError::DataLoad(StoreError::Io("missing dir".into()));
        assert_eq!(err.code(), "GM_CLI_DATA_LOAD_FAILED");
        assert!(err.to_string().contains("missing dir"));
    }
}
