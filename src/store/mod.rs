//! Data source subsystem
//!
//! The capability surface every backend implements, plus the bundled
//! in-memory backend the CLI and tests run against.
//!
//! # Guarantees
//!
//! - Reads never modify stored documents
//! - Collections keep insertion order
//! - Explain output is deterministic apart from timing

mod errors;
mod explain;
mod memory;
mod source;
pub mod value;

pub use errors::{StoreError, StoreResult};
pub use explain::{ExecutionStats, StageNode, COLLECTION_SCAN, INDEX_SCAN};
pub use memory::MemoryStore;
pub use source::{DataSource, FindOptions, IndexCreation};
