//! In-memory parent store and brute-force vector store.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A large chunk returned to callers as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentChunk {
    /// Position in the parent store.
    pub id: usize,
    /// Chunk text.
    pub content: String,
    /// Source file, for display.
    pub source: String,
    /// Page within the source file.
    pub page: usize,
}

/// One embedded child chunk pointing at its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Id of the parent chunk this child was cut from.
    pub parent_id: usize,
    /// Embedding of the child chunk.
    pub vector: Vec<f32>,
}

/// Brute-force cosine-similarity store. Suitable for a few thousand entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    dimension: usize,
    entries: Vec<VectorEntry>,
}

impl VectorStore {
    /// Creates an empty store for vectors of the given dimension.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension, entries: Vec::new() }
    }

    /// Adds an embedded child chunk.
    pub fn insert(&mut self, parent_id: usize, vector: Vec<f32>) {
        self.entries.push(VectorEntry { parent_id, vector });
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns `(parent_id, score)` for every entry scoring at least
    /// `min_score`, best first. Equal scores keep insertion order.
    #[must_use]
    pub fn search(&self, query: &[f32], min_score: f32) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry.parent_id, cosine_similarity(query, &entry.vector)))
            .filter(|(_, score)| *score >= min_score)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored
    }
}

/// Cosine similarity between two vectors; zero if either has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_search_filters_and_orders() {
        let mut store = VectorStore::new(2);
        store.insert(0, vec![0.0, 1.0]);
        store.insert(1, vec![1.0, 0.1]);
        store.insert(2, vec![1.0, 0.0]);
        store.insert(3, vec![1.0, 0.0]);

        let hits = store.search(&[1.0, 0.0], 0.7);
        let ids: Vec<usize> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_search_nothing_above_threshold() {
        let mut store = VectorStore::new(2);
        store.insert(0, vec![0.0, 1.0]);
        assert!(store.search(&[1.0, 0.0], 0.7).is_empty());
    }
}
