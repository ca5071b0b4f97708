//! Structured logging
//!
//! JSON events with deterministic field ordering. Warnings here are
//! informational (orphan deletions, skipped attachments); they never
//! turn into failures.

mod logger;

pub use logger::{Logger, Severity};
