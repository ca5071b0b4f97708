//! CLI argument definitions using clap
//!
//! Commands:
//! - graphvault list --config <path>
//! - graphvault save --config <path> --title <title> --payload <file>
//! - graphvault export --config <path> --graph <id> --out <file>
//! - graphvault import --config <path> --file <file> --title <title>
//! - graphvault delete --config <path> --graph <id>
//! - graphvault drop --config <path>
//! - graphvault fetch --config <path> --name <name>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// graphvault - graph persistence: saves, binary containers, blobs
#[derive(Parser, Debug)]
#[command(name = "graphvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List saved graphs
    List {
        /// Path to configuration file
        #[arg(long, default_value = "./graphvault.json")]
        config: PathBuf,
    },

    /// Save a graph payload under a title
    Save {
        /// Path to configuration file
        #[arg(long, default_value = "./graphvault.json")]
        config: PathBuf,

        /// Save title
        #[arg(long)]
        title: String,

        /// Path to the JSON payload file
        #[arg(long)]
        payload: PathBuf,

        /// Overwrite same-title saves without asking
        #[arg(long)]
        force: bool,
    },

    /// Export a stored graph as a container file
    Export {
        /// Path to configuration file
        #[arg(long, default_value = "./graphvault.json")]
        config: PathBuf,

        /// Graph id to export
        #[arg(long)]
        graph: String,

        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Import a container file as a new (or overwriting) save
    Import {
        /// Path to configuration file
        #[arg(long, default_value = "./graphvault.json")]
        config: PathBuf,

        /// Container file to import
        #[arg(long)]
        file: PathBuf,

        /// Save title for the imported graph
        #[arg(long)]
        title: String,

        /// Overwrite same-title saves without asking
        #[arg(long)]
        force: bool,
    },

    /// Delete a stored graph and everything it owns
    Delete {
        /// Path to configuration file
        #[arg(long, default_value = "./graphvault.json")]
        config: PathBuf,

        /// Graph id to delete
        #[arg(long)]
        graph: String,
    },

    /// Drop every table in the data directory
    Drop {
        /// Path to configuration file
        #[arg(long, default_value = "./graphvault.json")]
        config: PathBuf,
    },

    /// Fetch a named remote state and print how it classifies
    Fetch {
        /// Path to configuration file
        #[arg(long, default_value = "./graphvault.json")]
        config: PathBuf,

        /// State name (fetched as <base>/<name>.txt)
        #[arg(long)]
        name: String,

        /// Write the fetched bytes to this file instead of classifying
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
