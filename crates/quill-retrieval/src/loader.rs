//! Document loading.
//!
//! PDFs go through a chain of extraction strategies; anything else is read
//! as UTF-8 text (lossy). Loading a set of files fans out onto the blocking
//! pool and returns pages in input order.

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One page of plain text extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Normalized page text, never empty.
    pub content: String,
    /// File the page came from.
    pub source: PathBuf,
    /// Zero-based page index within the file.
    pub index: usize,
}

type Strategy = fn(&Path) -> Result<Vec<String>, String>;

const PDF_STRATEGIES: [(&str, Strategy); 3] = [
    ("per-page", extract_by_pages),
    ("form-feed", extract_whole_document),
    ("object-tree", extract_raw_pages),
];

/// Loads a single file into pages.
///
/// # Errors
/// Returns `LoadError` when the file cannot be read, or when it is a PDF and
/// every extraction strategy fails.
pub fn load_file(path: &Path) -> Result<Vec<Page>, LoadError> {
    let raw_pages = if is_pdf(path) {
        extract_pdf(path)?
    } else {
        let bytes = std::fs::read(path)
            .map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
        vec![String::from_utf8_lossy(&bytes).into_owned()]
    };

    let pages: Vec<Page> = raw_pages
        .iter()
        .enumerate()
        .filter_map(|(index, text)| {
            let content = normalize(text);
            (!content.is_empty()).then(|| Page { content, source: path.to_path_buf(), index })
        })
        .collect();

    debug!(path = %path.display(), pages = pages.len(), "Loaded document");
    Ok(pages)
}

/// Loads every file concurrently, skipping files that fail with a warning.
///
/// Output preserves input order: all pages of the first file, then the second, and so on.
pub async fn load(paths: &[PathBuf]) -> Vec<Page> {
    let handles = paths.iter().cloned().map(|path| {
        tokio::task::spawn_blocking(move || {
            let result = load_file(&path);
            (path, result)
        })
    });

    let mut pages = Vec::new();
    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok((_, Ok(file_pages))) => pages.extend(file_pages),
            Ok((path, Err(e))) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable document");
            }
            Err(e) => warn!(error = %e, "Document loader task failed"),
        }
    }
    pages
}

fn is_pdf(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn extract_pdf(path: &Path) -> Result<Vec<String>, LoadError> {
    let mut last_failure = String::from("no strategy attempted");

    for (name, strategy) in PDF_STRATEGIES {
        // The PDF parsers panic on some malformed inputs.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| strategy(path)))
            .unwrap_or_else(|_| Err("extractor panicked".to_string()));

        match outcome {
            Ok(pages) if pages.iter().any(|p| !p.trim().is_empty()) => {
                debug!(path = %path.display(), strategy = name, "PDF extraction succeeded");
                return Ok(pages);
            }
            Ok(_) => last_failure = format!("{name}: no text"),
            Err(reason) => {
                debug!(path = %path.display(), strategy = name, reason = %reason, "PDF strategy failed");
                last_failure = format!("{name}: {reason}");
            }
        }
    }

    Err(LoadError::Extraction { path: path.to_path_buf(), reason: last_failure })
}

fn extract_by_pages(path: &Path) -> Result<Vec<String>, String> {
    pdf_extract::extract_text_by_pages(path).map_err(|e| e.to_string())
}

fn extract_whole_document(path: &Path) -> Result<Vec<String>, String> {
    let text = pdf_extract::extract_text(path).map_err(|e| e.to_string())?;
    Ok(text.split('\x0c').map(str::to_string).collect())
}

fn extract_raw_pages(path: &Path) -> Result<Vec<String>, String> {
    let document = lopdf::Document::load(path).map_err(|e| e.to_string())?;
    let pages = document
        .get_pages()
        .keys()
        .map(|number| document.extract_text(&[*number]).unwrap_or_default())
        .collect();
    Ok(pages)
}

/// Strips control characters, trailing whitespace and runs of blank lines.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    let mut blank_run = 0;
    for line in cleaned.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_collapses_blank_lines() {
        let text = "Title\r\n\r\n\r\n\r\nBody  \n\x00\nEnd";
        assert_eq!(normalize(text), "Title\n\nBody\n\nEnd");
    }

    #[test]
    fn test_text_file_is_single_page() {
        let mut file = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "Line one.\nLine two.").unwrap();

        let pages = load_file(file.path()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].index, 0);
        assert_eq!(pages[0].content, "Line one.\nLine two.");
    }

    #[test]
    fn test_whitespace_only_file_has_no_pages() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "   \n\n\t ").unwrap();
        assert!(load_file(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_pdf_fails_all_strategies() {
        let mut file = tempfile::NamedTempFile::with_suffix(".pdf").unwrap();
        write!(file, "this is not a pdf").unwrap();

        let err = load_file(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_load_skips_bad_files_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        std::fs::write(&first, "alpha").unwrap();
        std::fs::write(&second, "beta").unwrap();
        let missing = dir.path().join("missing.txt");

        let pages = load(&[second.clone(), missing, first.clone()]).await;
        let contents: Vec<_> = pages.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["beta", "alpha"]);
        assert_eq!(pages[0].source, second);
    }
}
