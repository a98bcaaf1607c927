//! Heading-boundary chunking.
//!
//! Splits strictly at heading lines: every heading at or above the
//! configured level (numerically `<=` it) starts a new chunk, and each
//! chunk carries the full ancestor path of its opening heading.
//!
//! ## Why Track Every Heading
//!
//! Split points are only the coarse headings, but deeper headings still
//! shape the path of later sections:
//!
//! ```text
//! # A            <- split; path [A]
//! ## B           <- not a split (level 2 > 1), but recorded
//! # C            <- split; path [C], because B was popped by C
//! ```
//!
//! So the walk advances a level-ordered stack through *all* headings up to
//! each split point, not just the split headings themselves.

use crate::chunk::trim_span;
use crate::heading::{explicit_headings, first_heading_path, HeadingStack};
use crate::{Chunk, Chunker};

/// Chunker that splits at heading boundaries only.
///
/// Produces one chunk per section regardless of size; pair with
/// [`HybridChunker`](crate::HybridChunker) when a size bound is needed.
///
/// ## Example
///
/// ```rust
/// use strata::{Chunker, SemanticChunker};
///
/// let text = "# A\n\ntext1\n\n## B\n\ntext2";
/// let chunks = SemanticChunker::new(1).chunk(text);
///
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].heading_path, vec!["A"]);
/// assert!(chunks[0].text.contains("## B"));
/// ```
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    heading_level: u8,
}

impl SemanticChunker {
    /// Create a chunker splitting at headings of `heading_level` or
    /// shallower.
    ///
    /// # Panics
    ///
    /// Panics if `heading_level` is not in `1..=6`.
    #[must_use]
    pub fn new(heading_level: u8) -> Self {
        assert!(
            (1..=6).contains(&heading_level),
            "heading_level must be in 1..=6"
        );
        Self { heading_level }
    }
}

impl Chunker for SemanticChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let all = explicit_headings(text);

        if all.is_empty() {
            return match trim_span(text, 0, text.len()) {
                Some((start, end)) => {
                    vec![Chunk::new(&text[start..end], Vec::new(), start, end, 0)]
                }
                None => Vec::new(),
            };
        }

        let splits: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, h)| h.level <= self.heading_level)
            .map(|(i, _)| i)
            .collect();

        if splits.is_empty() {
            // Headings exist but all deeper than the split level: one
            // chunk, with its path taken from its own first heading.
            return match trim_span(text, 0, text.len()) {
                Some((start, end)) => {
                    let path = first_heading_path(text);
                    vec![Chunk::new(&text[start..end], path, start, end, 0)]
                }
                None => Vec::new(),
            };
        }

        let mut chunks = Vec::with_capacity(splits.len() + 1);

        // Content before the first split heading becomes its own chunk.
        let first_pos = all[splits[0]].position;
        if first_pos > 0 {
            if let Some((start, end)) = trim_span(text, 0, first_pos) {
                let path = first_heading_path(&text[start..end]);
                chunks.push(Chunk::new(&text[start..end], path, start, end, 0));
            }
        }

        let mut stack = HeadingStack::new();
        let mut walked = 0;

        for (i, &split) in splits.iter().enumerate() {
            let split_pos = all[split].position;

            // Advance the stack through every heading up to and including
            // this split point, so deeper headings contribute to the path.
            while walked < all.len() && all[walked].position <= split_pos {
                stack.push(all[walked].level, &all[walked].title);
                walked += 1;
            }

            let start = split_pos;
            let mut end = match splits.get(i + 1) {
                Some(&next) => all[next].position,
                None => text.len(),
            };
            while end > start && text.as_bytes()[end - 1] == b'\n' {
                end -= 1;
            }

            if let Some((start, end)) = trim_span(text, start, end) {
                chunks.push(Chunk::new(
                    &text[start..end],
                    stack.path(),
                    start,
                    end,
                    chunks.len(),
                ));
            }
        }

        chunks
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        // Sections trend much larger than fixed windows.
        (text_len / 2000).max(1)
    }
}
