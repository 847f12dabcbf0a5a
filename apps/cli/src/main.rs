//! Quill CLI - Command-line interface for the Quill task engine
//!
//! Provides a `quill` command that plans a writing task into subtasks, runs
//! them concurrently, merges and verifies the result, and manages the
//! retrieval index over supplementary documents.

mod commands;
mod config;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use commands::types::IndexCommand;
use commands::{index, plan, run};
use config::CliConfig;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Quill CLI - plan, execute, merge and verify long-form tasks
#[derive(Parser, Debug)]
#[command(
    name = "quill",
    author,
    version,
    about = "Quill - plan, execute, merge and verify long-form tasks",
    long_about = "Quill decomposes a task into independent subtasks, runs them concurrently against an LLM,\nmerges the parts under a word ceiling and verifies the result, retrying with feedback."
)]
struct Args {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Additional configuration file, applied after ~/.quill/config.toml and ./.quillrc
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a task end to end
    ///
    /// Plans the task, executes every subtask concurrently, merges the parts
    /// and verifies the result, retrying with feedback up to --max-rounds times.
    Run {
        /// Task description
        task: String,

        /// Instructional file (rubric, style guide, word limit)
        #[arg(short, long)]
        instructions: Option<PathBuf>,

        /// Supplementary document to ground subtasks in (repeatable)
        #[arg(short, long = "supplementary")]
        supplementary: Vec<PathBuf>,

        /// Maximum number of retry rounds after the first
        #[arg(long)]
        max_rounds: Option<u32>,

        /// Output the full outcome as JSON
        #[arg(long)]
        json: bool,

        /// Write the merged artifact to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Plan a task without executing it
    Plan {
        /// Task description
        task: String,

        /// Instructional file (rubric, style guide, word limit)
        #[arg(short, long)]
        instructions: Option<PathBuf>,

        /// Output the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage retrieval indexes over supplementary documents
    #[command(subcommand)]
    Index(IndexCommand),
}

fn init_logging(directive: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_writer(io::stderr)).try_init()?;
    } else {
        registry
            .with(fmt::layer().without_time().with_target(false).with_writer(io::stderr))
            .try_init()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let cli_config = CliConfig::discover_and_load(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Flag, then RUST_LOG, then config file.
    let directive = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .or_else(|| cli_config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    init_logging(&directive, args.log_json)?;

    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Run { task, instructions, supplementary, max_rounds, json, output } => {
            let args = run::RunArgs { task, instructions, supplementary, max_rounds, json, output };
            run::execute(&cli_config, args).await?;
        }
        Command::Plan { task, instructions, json } => {
            plan::execute(&cli_config, task, instructions, json).await?;
        }
        Command::Index(cmd) => {
            index::execute(&cli_config, cmd).await?;
        }
    }

    Ok(())
}
