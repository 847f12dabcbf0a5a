//! Context retrieval for Quill.
//!
//! Supplementary documents are loaded into pages, split into large parent
//! chunks and small child chunks, and the children are embedded. Queries
//! match against children and return their parents. Built indexes are
//! cached on disk under a hash of the input file set.

pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod splitter;
pub mod store;

pub use cache::{fileset_hash, IndexCache, Manifest};
pub use config::RetrievalConfig;
pub use error::{LoadError, RetrievalError};
pub use index::{format_snippets, query, ContextSnippet, RetrievalIndex, RetrievalService};
pub use loader::{load, load_file, Page};
pub use splitter::TextSplitter;
pub use store::{ParentChunk, VectorStore};
