//! Run command implementation.
//!
//! Runs a task through the full plan, execute, merge and verify loop.

use crate::config::CliConfig;
use anyhow::Context;
use colored::Colorize;
use comfy_table::{Cell, Color as ComfyColor, Table};
use quill_engine::TaskOutcome;
use std::path::PathBuf;
use tracing::info;

/// Arguments for `quill run`.
#[derive(Debug)]
pub struct RunArgs {
    pub task: String,
    pub instructions: Option<PathBuf>,
    pub supplementary: Vec<PathBuf>,
    pub max_rounds: Option<u32>,
    pub json: bool,
    pub output: Option<PathBuf>,
}

/// Execute the run command.
pub async fn execute(config: &CliConfig, args: RunArgs) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(max_rounds) = args.max_rounds {
        config.engine.max_rounds = max_rounds;
    }

    let engine = super::engine(&config)?;
    let outcome = engine
        .process_task(&args.task, args.instructions.as_deref(), &args.supplementary)
        .await?;

    if let Some(ref path) = args.output {
        tokio::fs::write(path, &outcome.merged_result)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Merged result written");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome, args.output.is_none());
    }

    Ok(())
}

fn print_outcome(outcome: &TaskOutcome, show_artifact: bool) {
    println!("{}", "quill run".bold().cyan());
    println!();

    if show_artifact {
        println!("{}", outcome.merged_result);
        println!();
    }

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Result", "Comment"]);
    for metric in &outcome.verification_report.metrics {
        let result = if metric.passed {
            Cell::new("pass").fg(ComfyColor::Green)
        } else {
            Cell::new("fail").fg(ComfyColor::Red)
        };
        table.add_row(vec![Cell::new(&metric.metric), result, Cell::new(&metric.comment)]);
    }
    println!("{table}");
    println!();

    let status = if outcome.fully_verified {
        "verified".green()
    } else {
        "best effort (verification failed)".yellow()
    };
    println!(
        "  Status: {}  Rounds: {}  Retries: {}",
        status, outcome.rounds, outcome.retry_count
    );
}
