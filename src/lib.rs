//! graphvault - graph persistence: saves, binary containers, blobs
//!
//! A persistence core for node-graph documents: a key-value store
//! contract with memory and file backends, a typed facade over the
//! graph/blob tables, a self-describing binary container format with
//! two legacy tiers, blob-set reconciliation across save generations,
//! and a save orchestrator that resolves title conflicts and recovers
//! from storage quota exhaustion.

pub mod cli;
pub mod config;
pub mod container;
pub mod graph;
pub mod observability;
pub mod reconcile;
pub mod save;
pub mod state;
pub mod store;
