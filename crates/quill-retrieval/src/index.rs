//! Two-tier retrieval index and the service that builds or loads it.

use crate::cache::{fileset_hash, sorted_file_names, CachedIndex, IndexCache, Manifest};
use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::loader;
use crate::splitter::TextSplitter;
use crate::store::{ParentChunk, VectorStore};
use chrono::Utc;
use quill_abstraction::Embedder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A parent chunk returned for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    /// Parent chunk text.
    pub content: String,
    /// Source file.
    pub source: String,
    /// Best child-chunk similarity that selected this parent.
    pub score: f32,
}

/// A built, read-only index over one supplementary file set.
pub struct RetrievalIndex {
    hash: String,
    parents: Vec<ParentChunk>,
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    min_relevance: f32,
}

impl std::fmt::Debug for RetrievalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalIndex")
            .field("hash", &self.hash)
            .field("parents", &self.parents.len())
            .field("children", &self.store.len())
            .field("embedder", &self.embedder.model_id())
            .finish_non_exhaustive()
    }
}

impl RetrievalIndex {
    /// Content hash of the file set this index was built from.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Number of parent chunks.
    #[must_use]
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// Number of embedded child chunks.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.store.len()
    }

    /// Returns up to `k` distinct parent chunks whose children match `text`
    /// at or above the relevance threshold, best first.
    ///
    /// Never fails: an embedding error yields an empty list.
    pub async fn query(&self, text: &str, k: usize) -> Vec<ContextSnippet> {
        if k == 0 || text.trim().is_empty() {
            return Vec::new();
        }

        let query_vector = match self.embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(hash = %self.hash, error = %e, "Query embedding failed, returning no context");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let snippets: Vec<ContextSnippet> = self
            .store
            .search(&query_vector, self.min_relevance)
            .into_iter()
            .filter(|(parent_id, _)| seen.insert(*parent_id))
            .filter_map(|(parent_id, score)| {
                self.parents.get(parent_id).map(|parent| ContextSnippet {
                    content: parent.content.clone(),
                    source: parent.source.clone(),
                    score,
                })
            })
            .take(k)
            .collect();

        debug!(hash = %self.hash, k, hits = snippets.len(), "Retrieval query");
        snippets
    }
}

/// Queries an optional index; an absent index yields no snippets.
pub async fn query(index: Option<&RetrievalIndex>, text: &str, k: usize) -> Vec<ContextSnippet> {
    match index {
        Some(index) => index.query(text, k).await,
        None => Vec::new(),
    }
}

/// Renders snippets as `[i] text` blocks separated by blank lines, with
/// internal whitespace collapsed. Empty input renders as an empty string.
#[must_use]
pub fn format_snippets(snippets: &[ContextSnippet]) -> String {
    snippets
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {}", i + 1, s.content.split_whitespace().collect::<Vec<_>>().join(" ")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds retrieval indexes, reusing cached entries when possible.
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
    cache: Arc<IndexCache>,
}

impl RetrievalService {
    /// Creates a service backed by the cache directory in `config`.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        let cache = Arc::new(IndexCache::new(config.cache_dir.clone()));
        Self { embedder, config, cache }
    }

    /// Returns the index for `paths`, loading it from the cache or building
    /// and persisting it.
    ///
    /// # Errors
    /// Fails when no file yields any text, when embedding fails, or when the
    /// cache cannot be written.
    pub async fn build_or_load(&self, paths: &[PathBuf]) -> Result<Arc<RetrievalIndex>> {
        let hash = {
            let paths = paths.to_vec();
            tokio::task::spawn_blocking(move || fileset_hash(&paths)).await?
        };
        let files = sorted_file_names(paths);
        let embedder_id = self.embedder.model_id().to_string();
        let dimension = self.embedder.dimension();

        if let Some(cached) = self.load_cached(&hash, &files, &embedder_id, dimension).await? {
            info!(hash = %hash, parents = cached.parents.len(), "Retrieval index cache hit");
            return Ok(self.wrap(hash, cached));
        }

        let _guard = self.cache.acquire(&hash).await?;

        // Another builder may have finished while we waited.
        if let Some(cached) = self.load_cached(&hash, &files, &embedder_id, dimension).await? {
            info!(hash = %hash, "Retrieval index built concurrently, using cache");
            return Ok(self.wrap(hash, cached));
        }

        info!(hash = %hash, files = files.len(), "Retrieval index cache miss, building");
        let entry = self.build(paths, files, embedder_id, dimension).await?;
        let entry = self.store_cached(&hash, entry).await?;
        info!(
            hash = %hash,
            parents = entry.manifest.parent_count,
            children = entry.manifest.child_count,
            "Retrieval index built"
        );
        Ok(self.wrap(hash, entry))
    }

    async fn build(
        &self,
        paths: &[PathBuf],
        files: Vec<String>,
        embedder_id: String,
        dimension: usize,
    ) -> Result<CachedIndex> {
        let pages = loader::load(paths).await;
        if pages.is_empty() {
            return Err(RetrievalError::NoContent(paths.len()));
        }

        let parent_splitter =
            TextSplitter::new(self.config.parent_chunk_size, self.config.parent_chunk_overlap);
        let child_splitter =
            TextSplitter::new(self.config.child_chunk_size, self.config.child_chunk_overlap);

        let mut parents = Vec::new();
        let mut children: Vec<(usize, String)> = Vec::new();
        for page in &pages {
            for content in parent_splitter.split_text(&page.content) {
                let id = parents.len();
                children.extend(child_splitter.split_text(&content).into_iter().map(|c| (id, c)));
                parents.push(ParentChunk {
                    id,
                    content,
                    source: page.source.to_string_lossy().into_owned(),
                    page: page.index,
                });
            }
        }

        if children.is_empty() {
            return Err(RetrievalError::NoContent(paths.len()));
        }

        let mut store = VectorStore::new(dimension);
        for batch in children.chunks(self.config.embedding_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RetrievalError::EmbeddingCount { expected: batch.len(), actual: vectors.len() });
            }
            for ((parent_id, _), vector) in batch.iter().zip(vectors) {
                if vector.len() != dimension {
                    return Err(RetrievalError::Dimension { expected: dimension, actual: vector.len() });
                }
                store.insert(*parent_id, vector);
            }
        }

        let manifest = Manifest {
            files,
            embedder: embedder_id,
            dimension,
            parent_count: parents.len(),
            child_count: store.len(),
            created_at: Utc::now(),
        };
        Ok(CachedIndex { manifest, parents, store })
    }

    async fn load_cached(
        &self,
        hash: &str,
        files: &[String],
        embedder_id: &str,
        dimension: usize,
    ) -> Result<Option<CachedIndex>> {
        let cache = Arc::clone(&self.cache);
        let (hash, files, embedder_id) = (hash.to_string(), files.to_vec(), embedder_id.to_string());
        Ok(tokio::task::spawn_blocking(move || cache.load(&hash, &files, &embedder_id, dimension)).await?)
    }

    async fn store_cached(&self, hash: &str, entry: CachedIndex) -> Result<CachedIndex> {
        let cache = Arc::clone(&self.cache);
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || cache.store(&hash, &entry).map(|()| entry)).await?
    }

    fn wrap(&self, hash: String, entry: CachedIndex) -> Arc<RetrievalIndex> {
        Arc::new(RetrievalIndex {
            hash,
            parents: entry.parents,
            store: entry.store,
            embedder: Arc::clone(&self.embedder),
            min_relevance: self.config.min_relevance,
        })
    }
}
