//! Heading-boundary chunking with a size bound.
//!
//! The default strategy: split at headings first, then re-split any
//! section that exceeds the size limit using the fixed-window walker. The
//! sub-split is purely a size constraint, not a structural boundary, so
//! every sub-chunk inherits the parent section's heading path instead of
//! recomputing it from its own text:
//!
//! ```text
//! # Results                 section path: [Results]
//! <8 KB of prose>      ->   4 sub-chunks, all with path [Results]
//! ```

use crate::atomic::AtomicRegion;
use crate::chunk::trim_span;
use crate::fixed::split_windows;
use crate::semantic::SemanticChunker;
use crate::{Chunk, Chunker};

/// Semantic-then-fixed chunker, the primary strategy.
///
/// ## Example
///
/// ```rust
/// use strata::{Chunker, HybridChunker};
///
/// let text = "# A\n\nshort section\n\n# B\n\nanother short one";
/// let chunker = HybridChunker::new(1, 2000, Vec::new());
/// let chunks = chunker.chunk(text);
///
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[0].heading_path, vec!["A"]);
/// assert_eq!(chunks[1].heading_path, vec!["B"]);
/// ```
#[derive(Debug, Clone)]
pub struct HybridChunker {
    semantic: SemanticChunker,
    max_len: usize,
    regions: Vec<AtomicRegion>,
}

impl HybridChunker {
    /// Create a hybrid chunker splitting at `heading_level`, bounding
    /// chunks to `max_len` bytes, and never splitting inside `regions`.
    ///
    /// # Panics
    ///
    /// Panics if `heading_level` is not in `1..=6` or `max_len == 0`.
    #[must_use]
    pub fn new(heading_level: u8, max_len: usize, regions: Vec<AtomicRegion>) -> Self {
        assert!(max_len > 0, "max_len must be > 0");
        Self {
            semantic: SemanticChunker::new(heading_level),
            max_len,
            regions,
        }
    }
}

impl Chunker for HybridChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let sections = self.semantic.chunk(text);
        let mut chunks = Vec::with_capacity(sections.len());

        for section in sections {
            if section.len() <= self.max_len {
                let index = chunks.len();
                chunks.push(Chunk { index, ..section });
                continue;
            }

            // Oversized section: size-split it in place, every sub-chunk
            // inheriting the section's heading path.
            for (start, end) in split_windows(
                text,
                section.start..section.end,
                self.max_len,
                &self.regions,
            ) {
                if let Some((start, end)) = trim_span(text, start, end) {
                    chunks.push(Chunk::new(
                        &text[start..end],
                        section.heading_path.clone(),
                        start,
                        end,
                        chunks.len(),
                    ));
                }
            }
        }

        chunks
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        text_len.div_ceil(self.max_len).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::{detect, DetectorConfig};

    #[test]
    fn test_small_sections_pass_through() {
        let text = "# A\n\ntext1\n\n## B\n\ntext2";
        let chunks = HybridChunker::new(1, 2000, Vec::new()).chunk(text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading_path, vec!["A"]);
        assert!(chunks[0].text.contains("## B"));
    }

    #[test]
    fn test_oversized_section_resplit_with_inherited_path() {
        let body: String = (0..30)
            .map(|i| format!("Paragraph number {i} with some filler words.\n\n"))
            .collect();
        let text = format!("# Big Section\n\n{body}");
        let chunks = HybridChunker::new(1, 200, Vec::new()).chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.heading_path, vec!["Big Section"]);
            assert!(chunk.len() <= 200);
        }
    }

    #[test]
    fn test_subchunks_do_not_recompute_paths() {
        // The sub-heading inside the oversized section must not change
        // the inherited path of later sub-chunks.
        let filler = "words and more words. ".repeat(20);
        let text = format!("# Top\n\n{filler}\n\n## Inner\n\n{filler}");
        let chunks = HybridChunker::new(1, 250, Vec::new()).chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.heading_path, vec!["Top"]);
        }
    }

    #[test]
    fn test_oversized_table_survives_whole() {
        let rows: String = (0..300)
            .map(|i| format!("<tr><td>row {i}</td></tr>"))
            .collect();
        let text = format!("# Data\n\nintro words.\n\n<table>{rows}</table>\n\nclosing words.");
        assert!(text.len() > 2000);

        let regions = detect(&text, &DetectorConfig::default());
        assert_eq!(regions.len(), 1);
        let chunks = HybridChunker::new(1, 2000, regions.clone()).chunk(&text);

        let with_table: Vec<_> = chunks
            .iter()
            .filter(|c| c.text.contains("<table>"))
            .collect();
        assert_eq!(with_table.len(), 1);
        assert!(with_table[0].text.ends_with("</table>"));

        for chunk in &chunks {
            assert!(
                chunk.len() <= 2000 || chunk.span().contains(&regions[0].start),
                "oversized chunk without an oversized region"
            );
            assert_eq!(chunk.heading_path, vec!["Data"]);
        }
    }

    #[test]
    fn test_indices_sequential() {
        let filler = "sentence goes here. ".repeat(30);
        let text = format!("# A\n\n{filler}\n\n# B\n\n{filler}");
        let chunks = HybridChunker::new(1, 300, Vec::new()).chunk(&text);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert!(chunks.windows(2).all(|w| w[0].start <= w[1].start));
    }
}
