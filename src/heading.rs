//! Heading model, extraction, and hierarchy tracking.
//!
//! ## The Heading Stack
//!
//! Heading paths are maintained with a classic bounded-depth stack
//! discipline: pushing a heading at level L first pops every entry at
//! depth >= L, so the stack always mirrors a strictly increasing level
//! sequence. Walking a document through the stack yields, at any point,
//! the ancestor chain of the current position:
//!
//! ```text
//! # Report          stack: [Report]
//! ## Results        stack: [Report, Results]
//! ### Details       stack: [Report, Results, Details]
//! ## Discussion     stack: [Report, Discussion]   <- popped two levels
//! ```
//!
//! Depth is bounded by 6, so an explicit `Vec` is all the machinery this
//! needs.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a heading title kept in a path, in characters.
pub const MAX_TITLE_CHARS: usize = 30;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6}) (.+)$").expect("valid heading regex"));
static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6}) (.+)$").expect("valid heading line regex"));

/// A heading occurrence in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Heading depth, 1 through 6.
    pub level: u8,
    /// Title text with surrounding whitespace trimmed.
    pub title: String,
    /// Byte offset of the heading line start in the document.
    pub position: usize,
    /// The original line as written, used when rewriting the document.
    pub source: String,
    /// Whether this heading was inferred from an unmarked single-line
    /// paragraph rather than written with `#` markers.
    pub is_potential: bool,
}

/// Collect all explicit `#`-marked headings (levels 1-6) in document order.
#[must_use]
pub fn explicit_headings(text: &str) -> Vec<Heading> {
    HEADING
        .captures_iter(text)
        .map(|caps| {
            let marker = caps.get(1).expect("heading marker group");
            Heading {
                level: marker.len() as u8,
                title: caps[2].trim().to_string(),
                position: caps.get(0).expect("heading match").start(),
                source: caps[0].to_string(),
                is_potential: false,
            }
        })
        .collect()
}

/// A stack of heading titles tracking the ancestor chain while walking a
/// document top to bottom.
#[derive(Debug, Clone, Default)]
pub struct HeadingStack {
    entries: Vec<String>,
}

impl HeadingStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heading at `level`, popping every entry at that depth or
    /// deeper first. Titles are truncated to [`MAX_TITLE_CHARS`].
    pub fn push(&mut self, level: u8, title: &str) {
        while self.entries.len() >= usize::from(level.max(1)) {
            self.entries.pop();
        }
        self.entries.push(truncate_title(title));
    }

    /// The current ancestor chain, outermost first.
    #[must_use]
    pub fn path(&self) -> Vec<String> {
        self.entries.clone()
    }

    /// Whether no heading has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Truncate a heading title to [`MAX_TITLE_CHARS`] characters.
#[must_use]
pub(crate) fn truncate_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}

/// The heading path of a text fragment, taken at the *first* heading the
/// fragment contains.
///
/// The fragment as a whole is considered to live under that heading's
/// ancestry, so scanning stops there. A fragment with no headings has an
/// empty path.
///
/// ```rust
/// use strata::first_heading_path;
///
/// assert_eq!(first_heading_path("text\n## Setup\nmore"), vec!["Setup"]);
/// assert!(first_heading_path("no headings here").is_empty());
/// ```
#[must_use]
pub fn first_heading_path(fragment: &str) -> Vec<String> {
    let mut stack = HeadingStack::new();

    for line in fragment.lines() {
        if let Some(caps) = HEADING_LINE.captures(line.trim()) {
            let level = caps[1].len() as u8;
            stack.push(level, caps[2].trim());
            return stack.path();
        }
    }

    Vec::new()
}
