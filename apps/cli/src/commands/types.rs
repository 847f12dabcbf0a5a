//! Shared subcommand types.

use clap::Subcommand;
use std::path::PathBuf;

/// Index subcommands.
#[derive(Subcommand, Debug)]
pub enum IndexCommand {
    /// Build (or load from cache) the index for a set of documents
    Build {
        /// Documents to index (PDF or text)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query the index for a set of documents
    Query {
        /// Query text
        text: String,

        /// Documents to index (PDF or text)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Maximum number of snippets
        #[arg(short, long, default_value_t = 3)]
        k: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
