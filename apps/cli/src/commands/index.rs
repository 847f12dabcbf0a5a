//! Index command implementation.

use super::types::IndexCommand;
use crate::config::CliConfig;
use anyhow::Context;
use colored::Colorize;
use quill_retrieval::format_snippets;
use serde_json::json;

/// Execute an index subcommand.
pub async fn execute(config: &CliConfig, command: IndexCommand) -> anyhow::Result<()> {
    let service = super::retrieval_service(config)?;

    match command {
        IndexCommand::Build { files, json } => {
            let index = service.build_or_load(&files).await.context("Failed to build index")?;
            if json {
                let summary = json!({
                    "hash": index.hash(),
                    "files": files.len(),
                    "parents": index.parent_count(),
                    "children": index.child_count(),
                    "cache_dir": config.retrieval.cache_dir,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", "quill index build".bold().cyan());
                println!();
                println!("  Hash: {}", index.hash().green());
                println!("  Files: {}", files.len());
                println!("  Parent chunks: {}", index.parent_count());
                println!("  Child chunks: {}", index.child_count());
                println!("  Cache: {}", config.retrieval.cache_dir.display().to_string().dimmed());
            }
        }
        IndexCommand::Query { text, files, k, json } => {
            let index = service.build_or_load(&files).await.context("Failed to build index")?;
            let snippets = index.query(&text, k).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snippets)?);
            } else if snippets.is_empty() {
                println!("  {} No relevant context found", "•".dimmed());
            } else {
                println!("{}", format_snippets(&snippets));
            }
        }
    }

    Ok(())
}
