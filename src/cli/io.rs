//! Text output for CLI commands
//!
//! Reports go to stdout, one titled section at a time. Logs go to stderr
//! through `tracing`, so the two never interleave on one stream.

use std::fmt::Display;
use std::io::{self, Write};

use super::errors::CliResult;

/// Writes a titled section followed by one line per item
pub fn write_section<T: Display>(title: &str, items: &[T]) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    write_section_to(&mut stdout, title, items)?;
    stdout.flush()?;
    Ok(())
}

/// Writes a block of already formatted text
pub fn write_text(text: &impl Display) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    stdout.flush()?;
    Ok(())
}

fn write_section_to<W: Write, T: Display>(writer: &mut W, title: &str, items: &[T]) -> io::Result<()> {
    writeln!(writer, "=== {} ===", title)?;
    if items.is_empty() {
        writeln!(writer, "(none)")?;
    }
    for item in items {
        let text = item.to_string();
        writeln!(writer, "{}", text.trim_end())?;
    }
    writeln!(writer)
}
