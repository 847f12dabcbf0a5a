//! Round loop: plan, execute, merge, verify, retry.

use crate::completion::Completer;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::executor::{ExecutionContext, SubtaskExecutor};
use crate::merger::{extract_word_ceiling, Merger};
use crate::planner::Planner;
use crate::prompts;
use crate::task::{RoundState, SubtaskPlan, TaskOutcome, TaskRun};
use crate::verifier::Verifier;
use quill_abstraction::Model;
use quill_retrieval::{LoadError, RetrievalIndex, RetrievalService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs tasks end to end against one model.
pub struct Engine {
    config: EngineConfig,
    planner: Planner,
    executor: SubtaskExecutor,
    merger: Merger,
    verifier: Verifier,
    retrieval: Option<Arc<RetrievalService>>,
}

impl Engine {
    /// Creates an engine without retrieval.
    #[must_use]
    pub fn new(model: Arc<dyn Model>, config: EngineConfig) -> Self {
        let completer = Completer::new(model, config.call_timeout(), config.temperature);
        Self {
            planner: Planner::new(completer.clone(), config.planner_attempts),
            executor: SubtaskExecutor::new(completer.clone(), config.retrieval_k),
            merger: Merger::new(completer.clone(), config.merger_attempts, config.default_word_ceiling),
            verifier: Verifier::new(completer, config.verifier_attempts, config.verification.clone()),
            retrieval: None,
            config,
        }
    }

    /// Enables indexing of supplementary files.
    #[must_use]
    pub fn with_retrieval(mut self, service: Arc<RetrievalService>) -> Self {
        self.retrieval = Some(service);
        self
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loads inputs and runs the round loop.
    ///
    /// # Errors
    /// Fails when the instructional file cannot be read, when planning fails
    /// on every attempt, or when merging fails on every attempt. Running out of
    /// rounds is not an error.
    pub async fn process_task(
        &self,
        task_description: &str,
        instructional_file: Option<&Path>,
        supplementary_files: &[PathBuf],
    ) -> Result<TaskOutcome> {
        let instructional_content = load_instructions(instructional_file).await?;
        let retrieval = self.prepare_retrieval(supplementary_files).await;
        let run = TaskRun::new(task_description, instructional_content, retrieval);
        self.run(run).await
    }

    /// Produces a plan without executing it.
    ///
    /// # Errors
    /// Fails when the instructional file cannot be read or planning fails.
    pub async fn plan_only(
        &self,
        task_description: &str,
        instructional_file: Option<&Path>,
    ) -> Result<SubtaskPlan> {
        let instructional_content = load_instructions(instructional_file).await?;
        Ok(self.planner.plan(task_description, &instructional_content).await?)
    }

    /// Drives `run` through the round state machine until done.
    ///
    /// # Errors
    /// Propagates fatal planning and merging failures.
    pub async fn run(&self, mut run: TaskRun) -> Result<TaskOutcome> {
        let mut state = RoundState::Planning;
        let mut rounds = 0;

        while state != RoundState::Done {
            state = match state {
                RoundState::Planning => {
                    rounds += 1;
                    info!(round = rounds, retry_count = run.retry_count, "Planning");
                    run.plan = self
                        .planner
                        .plan(&run.task_description, &run.instructional_content)
                        .await
                        .inspect_err(|e| error!(round = rounds, error = %e, "Planning failed"))?;
                    run.partial_results.clear();
                    RoundState::Executing
                }
                RoundState::Executing => {
                    let ceiling =
                        extract_word_ceiling(&run.instructional_content, self.config.default_word_ceiling);
                    let ctx = Arc::new(ExecutionContext {
                        task_description: run.task_description.clone(),
                        instructional_content: run.instructional_content.clone(),
                        retrieval: run.retrieval.clone(),
                        target_words: ceiling / run.plan.len().max(1),
                    });
                    info!(
                        round = rounds,
                        subtasks = run.plan.len(),
                        has_retrieval = run.has_retrieval(),
                        "Executing"
                    );
                    run.partial_results =
                        self.executor.fan_out(&run.plan, ctx, self.config.max_concurrent_subtasks).await;
                    RoundState::Merging
                }
                RoundState::Merging => {
                    info!(round = rounds, "Merging");
                    run.merged_result = self
                        .merger
                        .merge(
                            &run.plan,
                            &run.partial_results,
                            &run.instructional_content,
                            &run.task_description,
                        )
                        .await
                        .inspect_err(|e| error!(round = rounds, error = %e, "Merging failed"))?;
                    RoundState::Verifying
                }
                RoundState::Verifying => {
                    info!(round = rounds, "Verifying");
                    run.verification_report = self
                        .verifier
                        .verify(&run.task_description, &run.instructional_content, &run.merged_result)
                        .await;

                    if run.verification_report.all_passed() {
                        info!(round = rounds, "All metrics passed");
                        RoundState::Done
                    } else if run.retry_count >= self.config.max_rounds {
                        warn!(
                            round = rounds,
                            max_rounds = self.config.max_rounds,
                            failed = %prompts::describe_failures(run.verification_report.failed()),
                            "Round limit reached, returning best effort"
                        );
                        RoundState::Done
                    } else {
                        warn!(
                            round = rounds,
                            failed = %prompts::describe_failures(run.verification_report.failed()),
                            "Verification failed, retrying with feedback"
                        );
                        run.apply_feedback();
                        RoundState::Planning
                    }
                }
                RoundState::Done => RoundState::Done,
            };
        }

        Ok(TaskOutcome {
            fully_verified: run.verification_report.all_passed(),
            merged_result: run.merged_result,
            verification_report: run.verification_report,
            rounds,
            retry_count: run.retry_count,
        })
    }

    /// Builds or loads the index for the supplementary files. Any failure
    /// disables retrieval for this run.
    async fn prepare_retrieval(&self, supplementary_files: &[PathBuf]) -> Option<Arc<RetrievalIndex>> {
        if supplementary_files.is_empty() {
            return None;
        }
        let Some(service) = &self.retrieval else {
            warn!(files = supplementary_files.len(), "Supplementary files given but retrieval is not configured");
            return None;
        };

        match service.build_or_load(supplementary_files).await {
            Ok(index) => {
                info!(
                    hash = %index.hash(),
                    parents = index.parent_count(),
                    children = index.child_count(),
                    "Retrieval index ready"
                );
                Some(index)
            }
            Err(e) => {
                warn!(error = %e, "Retrieval index unavailable, continuing without context");
                None
            }
        }
    }
}

/// Reads the instructional file as text; no file means no instructions.
async fn load_instructions(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(String::new());
    };
    let owned = path.to_path_buf();
    let loaded = tokio::task::spawn_blocking(move || quill_retrieval::load_file(&owned))
        .await
        .unwrap_or_else(|e| {
            Err(LoadError::Io { path: path.to_path_buf(), source: std::io::Error::other(e) })
        });
    let pages =
        loaded.map_err(|source| EngineError::Instructions { path: path.to_path_buf(), source })?;

    Ok(pages.into_iter().map(|p| p.content).collect::<Vec<_>>().join("\n"))
}
