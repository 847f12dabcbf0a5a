//! Recursive character text splitter.
//!
//! Text is split on the coarsest separator that occurs in it (paragraph,
//! then line, then sentence terminators, then words, then characters);
//! pieces still longer than the chunk size are split again with the next
//! separator. Adjacent pieces are then packed into chunks of at most
//! `chunk_size` characters, carrying up to `chunk_overlap` characters of
//! trailing context into the next chunk.

use std::collections::VecDeque;

/// Separators tried in order. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 8] = ["\n\n", "\n", ". ", "! ", "? ", "; ", " ", ""];

/// Splits text into overlapping chunks without breaking sentences where possible.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Creates a splitter with the default separators.
    ///
    /// `chunk_size` is clamped to at least 1 and `chunk_overlap` to less than `chunk_size`.
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Splits `text` into trimmed, non-empty chunks.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split_inclusive(separator).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                push_trimmed(&mut chunks, piece);
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Packs small pieces into chunks, keeping an overlap window.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if !window.is_empty() {
            push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
        }
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = TextSplitter::new(100, 10);
        assert_eq!(splitter.split_text("  A short note.  "), vec!["A short note."]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let splitter = TextSplitter::new(100, 10);
        assert!(splitter.split_text(" \n\n ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "First sentence here. Second sentence follows. Third one is longer than others. \
                    Fourth closes the paragraph.\n\nA new paragraph starts. It has two sentences.";
        let splitter = TextSplitter::new(60, 10);
        let chunks = splitter.split_text(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 60, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota.";
        let splitter = TextSplitter::new(20, 0);
        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["Alpha beta gamma.", "Delta epsilon zeta.", "Eta theta iota."]);
    }

    #[test]
    fn test_overlap_carries_context() {
        let text = "one two three four five six seven eight nine ten";
        let splitter = TextSplitter::new(20, 10);
        let chunks = splitter.split_text(text);

        assert!(chunks.len() >= 2);
        let first_tail = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].starts_with(first_tail), "{chunks:?}");
    }

    #[test]
    fn test_unbreakable_text_falls_back_to_characters() {
        let text = "x".repeat(25);
        let splitter = TextSplitter::new(10, 0);
        let chunks = splitter.split_text(&text);
        assert_eq!(chunks, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    #[test]
    fn test_overlap_is_clamped_below_chunk_size() {
        let splitter = TextSplitter::new(5, 50);
        let chunks = splitter.split_text("abcdefghijkl");
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert!(chunks.concat().contains("l"));
    }
}
