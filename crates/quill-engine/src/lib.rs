//! Quill task engine.
//!
//! A task is planned into independent subtasks, the subtasks run
//! concurrently (each optionally grounded in retrieved context), their
//! outputs are merged under a word ceiling, and the merged artifact is
//! verified. Failed verification appends feedback to the task and starts a
//! new round, up to `max_rounds` retries.

pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod merger;
pub mod planner;
pub mod prompts;
pub mod task;
pub mod verifier;

pub use completion::{Completer, OutputSchema};
pub use config::{EngineConfig, VerificationConfig, VerificationMode};
pub use engine::Engine;
pub use error::{CompletionError, EngineError, MergeError, PlanningError};
pub use executor::{degraded_marker, ExecutionContext, SubtaskExecutor};
pub use merger::{build_sections, extract_word_ceiling, word_count, Merger};
pub use planner::Planner;
pub use task::{
    MetricResult, RoundState, Subtask, SubtaskPlan, TaskOutcome, TaskRun, VerificationReport,
};
pub use verifier::Verifier;
