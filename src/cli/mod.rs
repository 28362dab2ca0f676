//! CLI module for GlobalMarket
//!
//! Provides command-line interface for:
//! - run: the whole batch (default)
//! - validate: validators and self-tests
//! - index: index setup and verification
//! - aggregate: pipelines, export and summary
//! - explain: execution statistics per pipeline
//! - audit: data quality against the validators

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command, DEFAULT_CONFIG};
pub use commands::{
    aggregate, audit, explain, index, run_all, run_command, validate, BatchReport, Session,
    ValidatorReport,
};
pub use config::Config;
pub use errors::{CliError, CliResult};
pub use io::{write_section, write_text};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command())
}
