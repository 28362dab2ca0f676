//! Log initialisation
//!
//! Installs a `tracing-subscriber` formatter once per process. `RUST_LOG`
//! overrides the configured level when set.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// Returns `false` when a subscriber was already installed, which is not an
/// error (tests and embedders may install their own).
pub fn init(level: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

/// Whether a filter is accepted as a configured log level.
///
/// Each comma-separated directive is either a bare level name or a
/// `target=level` pair, e.g. `info,globalmarket=debug`. Bare target names
/// are rejected so that a misspelt level is not read as a target.
pub fn is_valid_level(level: &str) -> bool {
    if level.trim().is_empty() || EnvFilter::try_new(level).is_err() {
        return false;
    }
    level.split(',').map(str::trim).all(|directive| {
        directive.contains('=') || is_level_name(directive)
    })
}

fn is_level_name(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    )
}
