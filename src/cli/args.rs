//! CLI argument definitions using clap
//!
//! Commands:
//! - globalmarket [run] --config <path>
//! - globalmarket validate --config <path>
//! - globalmarket index --config <path>
//! - globalmarket aggregate --config <path>
//! - globalmarket explain --config <path>
//! - globalmarket audit --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "./globalmarket.json";

/// GlobalMarket analytics batch: validation, indexes, pipelines, summary
#[derive(Parser, Debug)]
#[command(name = "globalmarket")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the whole batch: validation, indexes, pipelines, summary
    Run {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Apply validators and run their self-tests
    Validate {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Create indexes and list what is present
    Index {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Run the aggregation pipelines only
    Aggregate {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Show execution statistics for every pipeline
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Audit existing data against the validators
    Audit {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Run {
            config: PathBuf::from(DEFAULT_CONFIG),
        }
    }
}

impl Command {
    pub fn config(&self) -> &PathBuf {
        match self {
            Command::Run { config }
            | Command::Validate { config }
            | Command::Index { config }
            | Command::Aggregate { config }
            | Command::Explain { config }
            | Command::Audit { config } => config,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// The selected command, `run` when none was given
    pub fn command(self) -> Command {
        self.command.unwrap_or_default()
    }
}
