//! Engine error types.

use quill_abstraction::ModelError;
use quill_retrieval::LoadError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A single model call failed.
#[derive(Error, Debug, Clone)]
pub enum CompletionError {
    /// Transport or provider failure.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    /// The response did not decode into the expected shape, or was rejected
    /// by a policy check after decoding.
    #[error("response rejected: {0}")]
    Schema(String),

    /// The call did not finish in time.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

/// The planner could not produce an acceptable plan.
#[derive(Error, Debug)]
#[error("planning failed after {attempts} attempt(s): {last}")]
pub struct PlanningError {
    /// Attempts made.
    pub attempts: u32,
    /// Failure of the final attempt.
    pub last: CompletionError,
}

/// The merger could not produce a merged artifact.
#[derive(Error, Debug)]
#[error("merge failed after {attempts} attempt(s): {last}")]
pub struct MergeError {
    /// Attempts made for the failing call.
    pub attempts: u32,
    /// Failure of the final attempt.
    pub last: CompletionError,
}

/// Fatal failure of a task run, naming the stage.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The instructional file could not be read.
    #[error("instructions: cannot read {}: {source}", path.display())]
    Instructions {
        /// Path given by the caller.
        path: PathBuf,
        /// Loader failure.
        #[source]
        source: LoadError,
    },

    /// Planning stage failed.
    #[error("planning: {0}")]
    Planning(#[from] PlanningError),

    /// Merging stage failed.
    #[error("merging: {0}")]
    Merge(#[from] MergeError),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
