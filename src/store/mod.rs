//! # Key-Value Store Layer
//!
//! The persistence core only requires the [`KeyValueStore`] contract:
//! keyed load/save/delete and full-table iteration, all asynchronous.
//! Two backends are provided: an in-memory table (tests, ephemeral use)
//! and a file-per-key table (the CLI's data directory).
//!
//! No transaction spans multiple keys. Callers that depend on write
//! ordering sequence their awaits explicitly.

mod contract;
mod errors;
mod file;
mod memory;

pub use contract::{IterateVisitor, KeyValueStore};
pub use errors::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
