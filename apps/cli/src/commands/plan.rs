//! Plan command implementation.
//!
//! Decomposes a task into subtasks without executing them.

use crate::config::CliConfig;
use colored::Colorize;
use std::path::PathBuf;

/// Execute the plan command.
pub async fn execute(
    config: &CliConfig,
    task: String,
    instructions: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let engine = super::engine(config)?;
    let plan = engine.plan_only(&task, instructions.as_deref()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{}", "quill plan".bold().cyan());
    println!();
    for (i, subtask) in plan.subtasks.iter().enumerate() {
        println!("{} {}", format!("{}.", i + 1).bold(), subtask.name.green());
        for step in &subtask.steps {
            println!("     - {step}");
        }
        println!("     {} {}", "query:".dimmed(), subtask.semantic_query.dimmed());
    }

    Ok(())
}
