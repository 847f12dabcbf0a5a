//! Retrieval configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for index construction and querying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Root directory of the content-addressed index cache.
    pub cache_dir: PathBuf,
    /// Parent chunk size in characters.
    pub parent_chunk_size: usize,
    /// Parent chunk overlap in characters.
    pub parent_chunk_overlap: usize,
    /// Child chunk size in characters.
    pub child_chunk_size: usize,
    /// Child chunk overlap in characters.
    pub child_chunk_overlap: usize,
    /// Minimum cosine similarity for a child chunk to count as a hit.
    pub min_relevance: f32,
    /// Number of child chunks sent per embedding request.
    pub embedding_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache/quill"),
            parent_chunk_size: 2000,
            parent_chunk_overlap: 200,
            child_chunk_size: 1000,
            child_chunk_overlap: 100,
            min_relevance: 0.7,
            embedding_batch_size: 64,
        }
    }
}
