//! Subtask execution and per-round fan-out.

use crate::completion::Completer;
use crate::prompts;
use crate::task::{Subtask, SubtaskPlan};
use quill_retrieval::{format_snippets, query, RetrievalIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Output recorded for a subtask whose call failed.
#[must_use]
pub fn degraded_marker(subtask_name: &str) -> String {
    format!("Error occurred in {subtask_name}.")
}

/// Read-only inputs shared by every executor in a round.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Current task description, including any feedback notes.
    pub task_description: String,
    /// Instructional text.
    pub instructional_content: String,
    /// Retrieval index, when supplementary material is available.
    pub retrieval: Option<Arc<RetrievalIndex>>,
    /// Guidance for each subtask's length.
    pub target_words: usize,
}

/// Runs one subtask per model call.
#[derive(Clone)]
pub struct SubtaskExecutor {
    completer: Completer,
    retrieval_k: usize,
}

impl SubtaskExecutor {
    /// Creates an executor fetching up to `retrieval_k` snippets per subtask.
    #[must_use]
    pub fn new(completer: Completer, retrieval_k: usize) -> Self {
        Self { completer, retrieval_k }
    }

    /// Runs `subtask` and returns its trimmed output, or the degraded marker
    /// if the call fails or times out.
    pub async fn run(&self, subtask: &Subtask, ctx: &ExecutionContext) -> String {
        let context = if ctx.retrieval.is_some() {
            let snippets = query(ctx.retrieval.as_deref(), &subtask.semantic_query, self.retrieval_k).await;
            debug!(subtask = %subtask.name, snippets = snippets.len(), "Retrieved context");
            Some(format_snippets(&snippets))
        } else {
            None
        };

        let system = prompts::EXECUTOR.system_prompt();
        let user = prompts::executor_user(
            subtask,
            &ctx.task_description,
            &ctx.instructional_content,
            context.as_deref(),
            ctx.target_words,
        );

        match self.completer.complete(&system, &user, None).await {
            Ok(output) => output,
            Err(e) => {
                warn!(subtask = %subtask.name, error = %e, "Subtask degraded");
                degraded_marker(&subtask.name)
            }
        }
    }

    /// Runs every subtask of `plan` concurrently, at most `max_concurrent` at
    /// a time, and waits for all of them.
    ///
    /// The result has exactly one entry per plan subtask. A task that panics
    /// or is cancelled keeps its degraded marker.
    pub async fn fan_out(
        &self,
        plan: &SubtaskPlan,
        ctx: Arc<ExecutionContext>,
        max_concurrent: usize,
    ) -> HashMap<String, String> {
        let mut results: HashMap<String, String> =
            plan.names().map(|name| (name.to_string(), degraded_marker(name))).collect();

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for subtask in plan.subtasks.iter().cloned() {
            let executor = self.clone();
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let output = match semaphore.acquire_owned().await {
                    Ok(_permit) => executor.run(&subtask, &ctx).await,
                    Err(_) => degraded_marker(&subtask.name),
                };
                (subtask.name, output)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, output)) => {
                    results.insert(name, output);
                }
                Err(e) => warn!(error = %e, "Subtask task failed to join"),
            }
        }

        let degraded = plan.names().filter(|n| results.get(*n).is_some_and(|o| *o == degraded_marker(n))).count();
        info!(subtasks = plan.len(), degraded, "Execution round complete");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_marker_format() {
        assert_eq!(degraded_marker("body_1"), "Error occurred in body_1.");
    }
}
