//! # strata
//!
//! Structure-aware markdown chunking for retrieval-augmented generation
//! (RAG) pipelines.
//!
//! ## The Problem
//!
//! Documents extracted from PDFs and scans arrive as messy markdown:
//! escaped newlines, page numbers, dot-leader table-of-contents lines,
//! flattened heading levels, and tables or formulas that fall apart when
//! cut. Splitting such a document every N characters produces chunks a
//! retriever cannot use:
//!
//! - A table split mid-row is garbage
//! - A formula split between the equation and its variable definitions
//!   loses the math
//! - A chunk without its heading context ("which section is this from?")
//!   embeds poorly
//! - Extraction noise (page numbers, `\n` literals) pollutes every chunk
//!
//! This crate treats chunking as a pipeline:
//!
//! ```text
//! raw markdown
//!   -> normalize          (fix escapes, strip artifacts, tidy whitespace)
//!   -> correct headings   (optional, via an external language model)
//!   -> detect atomic regions   (tables, formula blocks, fenced code)
//!   -> chunk              (heading boundaries first, size bound second)
//!   -> attach metadata    (document title + heading path per chunk)
//! ```
//!
//! ## Chunking Strategies
//!
//! ### Semantic
//!
//! Split at heading lines only. Every heading at or above a configured
//! level starts a new chunk, and each chunk carries the ancestor chain of
//! its opening heading:
//!
//! ```text
//! # Report                 chunk 0, path [Report]
//! ## Results               (inside chunk 0)
//! # Appendix               chunk 1, path [Appendix]
//! ```
//!
//! **When to use**: Section-level retrieval where size does not matter.
//! **Weakness**: A single section can be arbitrarily large.
//!
//! ### Fixed
//!
//! Walk the text in windows of at most `max_len` bytes, clamping each
//! window to the best nearby boundary: a heading line, then a paragraph
//! break, then a sentence terminator, then the raw limit. Windows never
//! cut through an atomic region; a region wider than the window is
//! emitted whole as the single sanctioned size violation.
//!
//! **When to use**: Unstructured text, or as the inner splitter of the
//! hybrid strategy.
//! **Weakness**: Heading paths come from the chunk's own text only.
//!
//! ### Hybrid (Default)
//!
//! Semantic first, then fixed within any oversized section. Sub-chunks of
//! a split section inherit the section's heading path, so a 10 KB results
//! section yields five chunks all labeled `[Report, Results]`.
//!
//! **When to use**: The default for real documents.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::{detect, normalize, Chunker, DetectorConfig, HybridChunker,
//!              NormalizeOptions};
//!
//! let raw = "# Intro\\n\\nSome extracted text with literal escapes.";
//! let text = normalize(raw, &NormalizeOptions::default());
//! let regions = detect(&text, &DetectorConfig::default());
//!
//! let chunker = HybridChunker::new(1, 2000, regions);
//! let chunks = chunker.chunk(&text);
//!
//! assert_eq!(chunks[0].heading_path, vec!["Intro"]);
//! ```
//!
//! Or run the whole pipeline, metadata included:
//!
//! ```rust
//! use strata::pipeline::{run, ChunkRequest};
//!
//! let request = ChunkRequest {
//!     file_title: Some("report.pdf".to_string()),
//!     ..ChunkRequest::new("# Intro\n\nbody text.")
//! };
//! let rendered = run(&request)?;
//! assert!(rendered[0].starts_with("<metadata>"));
//! # Ok::<(), strata::Error>(())
//! ```
//!
//! ## Heading Correction
//!
//! Layout extractors routinely emit every heading as `#` and drop markers
//! from styled headings entirely. The optional [`enhance`] stage sends
//! the collected headings to an OpenAI-compatible chat service and
//! rewrites levels from its reply. The stage is strictly best-effort: any
//! failure leaves the text untouched.

mod atomic;
mod chunk;
pub mod enhance;
mod error;
mod fixed;
mod heading;
mod hybrid;
mod normalize;
pub mod pipeline;
mod semantic;

pub use atomic::{detect, in_region, region_at, AtomicKind, AtomicRegion, DetectorConfig};
pub use chunk::Chunk;
pub use error::{Error, Result};
pub use fixed::FixedChunker;
pub use heading::{
    explicit_headings, first_heading_path, Heading, HeadingStack, MAX_TITLE_CHARS,
};
pub use hybrid::HybridChunker;
pub use normalize::{normalize, NormalizeOptions};
pub use semantic::SemanticChunker;

/// A text chunking strategy.
///
/// All chunkers implement this trait, enabling polymorphic usage:
///
/// ```rust
/// use strata::{Chunker, FixedChunker, SemanticChunker};
///
/// fn chunk_document(chunker: &dyn Chunker, text: &str) -> Vec<strata::Chunk> {
///     chunker.chunk(text)
/// }
///
/// let fixed = FixedChunker::new(100, Vec::new());
/// let semantic = SemanticChunker::new(1);
///
/// let text = "# Hello\n\nThis is a test.";
/// let chunks1 = chunk_document(&fixed, text);
/// let chunks2 = chunk_document(&semantic, text);
/// ```
pub trait Chunker: Send + Sync {
    /// Split text into chunks.
    ///
    /// Each chunk is a [`Chunk`] carrying the text, its byte offsets in
    /// the input, and its heading path.
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    /// Estimate the number of chunks for a given text length.
    ///
    /// Useful for pre-allocation. May be approximate.
    fn estimate_chunks(&self, text_len: usize) -> usize {
        // Conservative default
        (text_len / 500).max(1)
    }
}
