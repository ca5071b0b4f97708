//! graphvault CLI entry point
//!
//! Minimal: parse arguments, dispatch, print the error, exit non-zero
//! on failure. All logic lives in the cli module.

use graphvault::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
