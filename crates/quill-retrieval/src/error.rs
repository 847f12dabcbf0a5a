//! Error types for document loading and retrieval.

use quill_abstraction::ModelError;
use std::path::PathBuf;
use thiserror::Error;

/// A document could not be turned into text.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Every PDF extraction strategy failed.
    #[error("could not extract text from {}: {reason}", path.display())]
    Extraction {
        /// File that failed.
        path: PathBuf,
        /// Failure of the last strategy tried.
        reason: String,
    },
}

/// Errors raised while building or reading a retrieval index.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// No readable text was found in any of the supplied files.
    #[error("no readable content in {0} supplementary file(s)")]
    NoContent(usize),

    /// The embedding service failed during index build.
    #[error("embedding failed: {0}")]
    Embedding(#[from] ModelError),

    /// The embedder returned vectors of the wrong size.
    #[error("embedder returned dimension {actual}, expected {expected}")]
    Dimension {
        /// Dimension the embedder advertises.
        expected: usize,
        /// Dimension actually returned.
        actual: usize,
    },

    /// The embedder returned a different number of vectors than texts sent.
    #[error("embedder returned {actual} vector(s) for {expected} text(s)")]
    EmbeddingCount {
        /// Texts in the batch.
        expected: usize,
        /// Vectors returned.
        actual: usize,
    },

    /// Cache I/O failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A cache file could not be (de)serialized.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
