//! Content-addressed on-disk index cache.
//!
//! Each supplementary file set hashes to a directory
//! `<root>/<hash>/` holding `parents.json`, `vectors.json` and
//! `manifest.json`. The manifest is written last; an entry without one is
//! incomplete and gets rebuilt.

use crate::error::Result;
use crate::store::{ParentChunk, VectorStore};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

const PARENTS_FILE: &str = "parents.json";
const VECTORS_FILE: &str = "vectors.json";
const MANIFEST_FILE: &str = "manifest.json";

/// Returns the file paths in the order used for hashing and manifests.
#[must_use]
pub fn sorted_file_names(paths: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    names.sort();
    names
}

/// Deterministic SHA-256 over the sorted file paths and their contents.
///
/// Paths are ordered by their display form, as in the manifest, but each
/// file is read through its original path. An unreadable file contributes
/// its error message instead of content, so the hash is always defined.
#[must_use]
pub fn fileset_hash(paths: &[PathBuf]) -> String {
    let mut entries: Vec<(String, &PathBuf)> =
        paths.iter().map(|p| (p.to_string_lossy().into_owned(), p)).collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for (name, path) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0]);
        let copied = File::open(path).and_then(|mut file| std::io::copy(&mut file, &mut hasher));
        if let Err(e) = copied {
            hasher.update(e.to_string().as_bytes());
        }
        hasher.update([0]);
    }
    hex::encode(hasher.finalize())
}

/// Describes a complete cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Sorted source file paths.
    pub files: Vec<String>,
    /// Id of the embedder that produced the vectors.
    pub embedder: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Number of parent chunks.
    pub parent_count: usize,
    /// Number of embedded child chunks.
    pub child_count: usize,
    /// When the entry was built.
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    /// Whether this entry was built from the same files with the same embedder.
    #[must_use]
    pub fn matches(&self, files: &[String], embedder: &str, dimension: usize) -> bool {
        self.files == files && self.embedder == embedder && self.dimension == dimension
    }
}

/// A deserialized cache entry.
#[derive(Debug, Clone)]
pub struct CachedIndex {
    /// Entry manifest.
    pub manifest: Manifest,
    /// Parent chunk store.
    pub parents: Vec<ParentChunk>,
    /// Child vector store.
    pub store: VectorStore,
}

/// Held while an index is being built for one hash.
///
/// Releases the in-process lock and the advisory file lock on drop.
pub struct BuildGuard {
    _local: OwnedMutexGuard<()>,
    _file: File,
}

/// Cache rooted at a directory.
#[derive(Debug)]
pub struct IndexCache {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IndexCache {
    /// Creates a cache rooted at `root`. Nothing is touched on disk yet.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root, locks: Mutex::new(HashMap::new()) }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the entry for `hash`.
    #[must_use]
    pub fn entry_dir(&self, hash: &str) -> PathBuf {
        self.root.join(hash)
    }

    /// Loads the entry for `hash` if it is complete and matches. Blocking;
    /// async callers run it on the blocking pool.
    ///
    /// Missing, incomplete, mismatched or corrupt entries all return `None`.
    #[must_use]
    pub fn load(&self, hash: &str, files: &[String], embedder: &str, dimension: usize) -> Option<CachedIndex> {
        let dir = self.entry_dir(hash);
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            debug!(hash = %hash, "No cache entry");
            return None;
        }

        let manifest: Manifest = read_json(&manifest_path)?;
        if !manifest.matches(files, embedder, dimension) {
            warn!(
                hash = %hash,
                cached_embedder = %manifest.embedder,
                cached_dimension = manifest.dimension,
                "Cache manifest mismatch, rebuilding"
            );
            return None;
        }

        let parents: Vec<ParentChunk> = read_json(&dir.join(PARENTS_FILE))?;
        let store: VectorStore = read_json(&dir.join(VECTORS_FILE))?;
        if parents.len() != manifest.parent_count
            || store.len() != manifest.child_count
            || store.dimension() != dimension
        {
            warn!(hash = %hash, "Cache entry counts disagree with manifest, rebuilding");
            return None;
        }

        Some(CachedIndex { manifest, parents, store })
    }

    /// Persists an entry. The manifest is written last. Blocking.
    ///
    /// # Errors
    /// Returns an error if any file cannot be written.
    pub fn store(&self, hash: &str, entry: &CachedIndex) -> Result<()> {
        let dir = self.entry_dir(hash);
        fs::create_dir_all(&dir)?;
        write_json_atomic(&dir.join(PARENTS_FILE), &entry.parents)?;
        write_json_atomic(&dir.join(VECTORS_FILE), &entry.store)?;
        write_json_atomic(&dir.join(MANIFEST_FILE), &entry.manifest)?;
        debug!(hash = %hash, dir = %dir.display(), "Cache entry written");
        Ok(())
    }

    /// Acquires the exclusive build guard for `hash`.
    ///
    /// Serializes builders within this process through an async mutex and
    /// across processes through an advisory lock on `<root>/<hash>.lock`.
    ///
    /// # Errors
    /// Returns an error if the lock file cannot be created or locked.
    pub async fn acquire(&self, hash: &str) -> Result<BuildGuard> {
        let local = {
            let mut locks = self.locks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(locks.entry(hash.to_string()).or_default())
        };
        let local = local.lock_owned().await;

        let root = self.root.clone();
        let lock_path = self.root.join(format!("{hash}.lock"));
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            fs::create_dir_all(&root)?;
            let file = OpenOptions::new().create(true).truncate(false).write(true).open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await??;

        Ok(BuildGuard { _local: local, _file: file })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read cache file");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt cache file");
            None
        }
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(files: Vec<String>) -> CachedIndex {
        let parents = vec![ParentChunk {
            id: 0,
            content: "Parent text".to_string(),
            source: "a.txt".to_string(),
            page: 0,
        }];
        let mut store = VectorStore::new(2);
        store.insert(0, vec![0.6, 0.8]);
        CachedIndex {
            manifest: Manifest {
                files,
                embedder: "mock".to_string(),
                dimension: 2,
                parent_count: 1,
                child_count: 1,
                created_at: Utc::now(),
            },
            parents,
            store,
        }
    }

    #[test]
    fn test_hash_ignores_argument_order_but_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "alpha").unwrap();
        fs::write(&b, "beta").unwrap();

        let h1 = fileset_hash(&[a.clone(), b.clone()]);
        let h2 = fileset_hash(&[b.clone(), a.clone()]);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        fs::write(&b, "beta changed").unwrap();
        assert_ne!(h1, fileset_hash(&[a, b]));
    }

    #[cfg(unix)]
    #[test]
    fn test_hash_reads_non_utf8_paths() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join(OsStr::from_bytes(b"notes-\xff.txt"));
        if fs::write(&odd, "first").is_err() {
            // Filesystem refuses non-UTF-8 names.
            return;
        }

        let before = fileset_hash(&[odd.clone()]);
        fs::write(&odd, "second").unwrap();
        let after = fileset_hash(&[odd.clone()]);
        assert_ne!(before, after);

        fs::remove_file(&odd).unwrap();
        assert_ne!(after, fileset_hash(&[odd]));
    }

    #[test]
    fn test_hash_defined_for_missing_file() {
        let missing = PathBuf::from("/definitely/not/here.txt");
        assert_eq!(fileset_hash(&[missing.clone()]), fileset_hash(&[missing]));
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new(dir.path().to_path_buf());
        let files = vec!["a.txt".to_string()];
        let entry = sample_entry(files.clone());

        cache.store("abc", &entry).unwrap();
        let loaded = cache.load("abc", &files, "mock", 2).unwrap();

        assert_eq!(loaded.parents, entry.parents);
        assert_eq!(loaded.store, entry.store);
        assert_eq!(loaded.manifest, entry.manifest);
    }

    #[test]
    fn test_manifest_mismatch_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new(dir.path().to_path_buf());
        let files = vec!["a.txt".to_string()];
        cache.store("abc", &sample_entry(files.clone())).unwrap();

        assert!(cache.load("abc", &files, "other-embedder", 2).is_none());
        assert!(cache.load("abc", &files, "mock", 3).is_none());
        assert!(cache.load("abc", &["b.txt".to_string()], "mock", 2).is_none());
    }

    #[test]
    fn test_entry_without_manifest_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new(dir.path().to_path_buf());
        let files = vec!["a.txt".to_string()];
        cache.store("abc", &sample_entry(files.clone())).unwrap();
        fs::remove_file(cache.entry_dir("abc").join(MANIFEST_FILE)).unwrap();

        assert!(cache.load("abc", &files, "mock", 2).is_none());
    }

    #[test]
    fn test_corrupt_vectors_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new(dir.path().to_path_buf());
        let files = vec!["a.txt".to_string()];
        cache.store("abc", &sample_entry(files.clone())).unwrap();
        fs::write(cache.entry_dir("abc").join(VECTORS_FILE), "{not json").unwrap();

        assert!(cache.load("abc", &files, "mock", 2).is_none());
    }

    #[tokio::test]
    async fn test_acquire_serializes_builders() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(IndexCache::new(dir.path().to_path_buf()));

        let guard = cache.acquire("h").await.unwrap();
        assert!(dir.path().join("h.lock").exists());

        let contender = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.acquire("h").await.map(|_| ()) })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap().unwrap();
    }
}
