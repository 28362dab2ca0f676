//! Schema validation subsystem
//!
//! Declares structural constraints per collection and applies them through
//! the data source with a configurable enforcement level.
//!
//! # Design Principles
//!
//! - Enforcement is delegated to the store
//! - `error` is attempted first, `warn` is the fallback
//! - The effective level is always logged
//! - Audits and self-tests never leave data behind

pub mod catalog;
mod errors;
mod rules;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaResult};
pub use rules::{RuleChecker, Violation, ViolationKind};
pub use types::{value_type_name, BsonType, FieldRule, ValidationLevel, ValidationSpec};
pub use validator::{ApplyResult, AuditReport, SchemaValidator, SELF_TEST_MARKER};
