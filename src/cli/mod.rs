//! CLI module for graphvault
//!
//! Provides command-line interface for:
//! - list: show saved graphs
//! - save: save a JSON payload under a title
//! - export / import: container files
//! - delete / drop: remove one graph or every table
//! - fetch: pull a named remote state

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::run;
pub use errors::{CliError, CliResult};
