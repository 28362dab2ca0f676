//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed
//! - Logs `{name}_INCOMPLETE` if dropped without being closed

use std::cell::Cell;
use std::fmt;

use tracing::{error, info, warn};

/// A unit of work that reports how it ended
///
/// # Usage
///
/// ```ignore
/// let scope = ObservationScope::with_subject("PIPELINE", "top_productos");
/// // ... do work ...
/// scope.complete(); // logs PIPELINE_COMPLETE
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    subject: Option<String>,
    completed: Cell<bool>,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope
    ///
    /// Logs `{name}_BEGIN` immediately.
    pub fn new(name: &'a str) -> Self {
        info!(event = %format!("{}_BEGIN", name));
        Self {
            name,
            subject: None,
            completed: Cell::new(false),
        }
    }

    /// Create a scope about a named subject (collection, pipeline, index)
    pub fn with_subject(name: &'a str, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        info!(event = %format!("{}_BEGIN", name), subject = %subject);
        Self {
            name,
            subject: Some(subject),
            completed: Cell::new(false),
        }
    }

    fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("-")
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.completed.set(true);
        info!(event = %format!("{}_COMPLETE", self.name), subject = %self.subject());
    }

    /// Mark the scope as completed with an outcome detail
    pub fn complete_with(self, detail: impl fmt::Display) {
        self.completed.set(true);
        info!(
            event = %format!("{}_COMPLETE", self.name),
            subject = %self.subject(),
            detail = %detail
        );
    }

    /// Mark the scope as failed
    pub fn fail(self, reason: impl fmt::Display) {
        self.completed.set(true);
        error!(
            event = %format!("{}_FAILED", self.name),
            subject = %self.subject(),
            reason = %reason
        );
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            warn!(
                event = %format!("{}_INCOMPLETE", self.name),
                subject = %self.subject(),
                reason = "scope dropped without completion"
            );
        }
    }
}
