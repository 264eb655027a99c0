//! CLI argument parsing for slicestore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Inspect and edit durable JSON slices", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all slices
    List,

    /// Print a slice document
    Get {
        /// Slice key
        #[arg(required = true)]
        key: String,
    },

    /// Replace a slice document with the given JSON
    Set {
        /// Slice key
        #[arg(required = true)]
        key: String,

        /// JSON document ("-" reads stdin)
        #[arg(required = true)]
        value: String,
    },

    /// Remove a slice
    Remove {
        /// Slice key
        #[arg(required = true)]
        key: String,
    },

    /// Print the store directory
    Path,
}
