//! Size-bounded window chunking with boundary awareness.
//!
//! Walks the document in windows of at most `max_len` bytes, clamping each
//! window's end to the best nearby split point. "Best" privileges
//! structural integrity over window fill:
//!
//! ```text
//! 1. A line break immediately before a heading marker
//! 2. A paragraph break (blank line)
//! 3. A sentence terminator (。！？ . ! ?) plus trailing whitespace
//! 4. The raw window end (last resort)
//! ```
//!
//! Within each priority, the *last* occurrence wins, maximizing window
//! fill.
//!
//! ## Atomic Regions
//!
//! A window whose end lands inside an atomic region is pulled back to the
//! region's start. When that empties the window — the region alone is
//! wider than `max_len` — the whole region is emitted as one oversized
//! chunk instead; this is the single sanctioned exception to the size
//! bound.

use std::ops::Range;

use regex::Regex;
use std::sync::LazyLock;

use crate::atomic::{region_at, AtomicRegion};
use crate::chunk::trim_span;
use crate::heading::first_heading_path;
use crate::{Chunk, Chunker};

static HEADING_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{1,6} ").expect("valid heading break regex"));
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。！？.!?]\s*").expect("valid sentence end regex"));

/// Fixed-size chunker with structural split points.
///
/// Each chunk's heading path is derived from the chunk's own text (its
/// first heading, if any); use [`HybridChunker`](crate::HybridChunker)
/// when paths should come from the surrounding document structure.
///
/// ## Example
///
/// ```rust
/// use strata::{Chunker, FixedChunker};
///
/// let chunker = FixedChunker::new(40, Vec::new());
/// let text = "First paragraph here.\n\nSecond paragraph follows it.";
/// let chunks = chunker.chunk(text);
///
/// assert_eq!(chunks[0].text, "First paragraph here.");
/// ```
#[derive(Debug, Clone)]
pub struct FixedChunker {
    max_len: usize,
    regions: Vec<AtomicRegion>,
}

impl FixedChunker {
    /// Create a fixed-size chunker.
    ///
    /// `regions` are the atomic regions of the text this chunker will be
    /// handed, in the same coordinate space.
    ///
    /// # Panics
    ///
    /// Panics if `max_len == 0`.
    #[must_use]
    pub fn new(max_len: usize, regions: Vec<AtomicRegion>) -> Self {
        assert!(max_len > 0, "max_len must be > 0");
        Self { max_len, regions }
    }
}

impl Chunker for FixedChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::with_capacity(self.estimate_chunks(text.len()));

        for (start, end) in split_windows(text, 0..text.len(), self.max_len, &self.regions) {
            if let Some((start, end)) = trim_span(text, start, end) {
                let body = &text[start..end];
                let path = first_heading_path(body);
                chunks.push(Chunk::new(body, path, start, end, chunks.len()));
            }
        }

        chunks
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        text_len.div_ceil(self.max_len).max(1)
    }
}

/// Walk `range` in windows of at most `max_len` bytes, each clamped to the
/// best split point, and return the resulting spans.
///
/// Operates on the full document text with absolute offsets so the atomic
/// regions (document-coordinate spans) stay valid even when `range` is a
/// single section of a larger document.
pub(crate) fn split_windows(
    text: &str,
    range: Range<usize>,
    max_len: usize,
    regions: &[AtomicRegion],
) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = range.start;

    while start < range.end {
        let mut end = (start + max_len).min(range.end);
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let mut split = best_split_point(text, start, end, regions);

        if split <= start {
            // The window did not advance: an atomic region at the cursor
            // wider than the window must be emitted whole.
            split = match region_at(regions, start) {
                Some(region) => region.end.min(range.end),
                None => end,
            };
        }
        if split <= start {
            // A single character wider than max_len; step over it.
            split = (start + 1..=range.end)
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(range.end);
        }

        spans.push((start, split));
        start = split;
    }

    spans
}

/// The best position to split `[start, end)`, honoring atomic regions.
///
/// Returns `region.end` when the window is swallowed by a region covering
/// `start`; callers must treat any result `<= start` as "window did not
/// advance" and force progress themselves.
pub(crate) fn best_split_point(
    text: &str,
    start: usize,
    end: usize,
    regions: &[AtomicRegion],
) -> usize {
    let mut end = end;

    // Never cut through an atomic region: pull the window back to the
    // start of the first region spanning across `end`.
    for region in regions {
        if region.start < end && end <= region.end {
            end = region.start;
            break;
        }
    }

    if end <= start {
        // The window collapsed onto a region; emit it whole.
        if let Some(region) = region_at(regions, start) {
            return region.end;
        }
        return end;
    }

    let window = &text[start..end];

    if let Some(m) = HEADING_BREAK.find_iter(window).last() {
        // +1 keeps the line break with the preceding chunk.
        return start + m.start() + 1;
    }

    if let Some(pos) = window.rfind("\n\n") {
        return start + pos + 2;
    }

    if let Some(m) = SENTENCE_END.find_iter(window).last() {
        let split = start + m.end();
        if split > start {
            return split;
        }
    }

    end
}
