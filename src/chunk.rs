//! The Chunk type: a piece of text with position and heading context.

use serde::Serialize;

/// A chunk of text with its position in the source document and the
/// heading hierarchy it belongs to.
///
/// ## Byte Offsets
///
/// `start` and `end` are byte offsets into the normalized document, not
/// character indices. This matches Rust's string slicing semantics:
///
/// ```rust
/// use strata::Chunk;
///
/// let text = "# Intro\n\nHello, world!";
/// let chunk = Chunk::new("Hello, world!", vec!["Intro".to_string()], 9, 22, 0);
///
/// // The offsets let you recover the original position
/// assert_eq!(&text[chunk.start..chunk.end], "Hello, world!");
/// ```
///
/// ## Heading Path
///
/// `heading_path` holds the ordered ancestor chain of heading titles for
/// the chunk, outermost first. A chunk under `# Report` → `## Results`
/// carries `["Report", "Results"]` even when neither heading line appears
/// in the chunk text itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// The chunk text, trimmed of surrounding whitespace.
    pub text: String,
    /// Ancestor heading titles, outermost first. Empty when the chunk has
    /// no heading context.
    pub heading_path: Vec<String>,
    /// Byte offset where the trimmed text starts in the source document.
    pub start: usize,
    /// Byte offset where the trimmed text ends (exclusive).
    pub end: usize,
    /// Zero-based index of this chunk in the output sequence.
    pub index: usize,
}

impl Chunk {
    /// Create a new chunk.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        heading_path: Vec<String>,
        start: usize,
        end: usize,
        index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            heading_path,
            start,
            end,
            index,
        }
    }

    /// The length of this chunk in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether this chunk is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The byte span of this chunk in the source document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// The heading path rendered as `"h1 > h2 > h3"`.
    #[must_use]
    pub fn path_string(&self) -> String {
        self.heading_path.join(" > ")
    }
}

impl std::fmt::Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunk {{ index: {}, span: {}..{}, path: [{}] }}",
            self.index,
            self.start,
            self.end,
            self.path_string()
        )
    }
}

/// Trim a span to its non-whitespace core, returning the adjusted
/// absolute offsets. `None` when nothing but whitespace remains.
pub(crate) fn trim_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let leading = slice.len() - slice.trim_start().len();
    Some((start + leading, start + leading + trimmed.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_span() {
        let text = "  hello  ";
        assert_eq!(trim_span(text, 0, text.len()), Some((2, 7)));
        assert_eq!(trim_span(text, 0, 2), None);

        let text = "a\n\n  b";
        assert_eq!(trim_span(text, 1, text.len()), Some((5, 6)));
    }

    #[test]
    fn test_span_recovers_source() {
        let text = "intro\n\n# One\n\nbody";
        let chunk = Chunk::new("body", vec!["One".to_string()], 14, 18, 1);
        assert_eq!(&text[chunk.span()], "body");
    }

    #[test]
    fn test_path_string() {
        let chunk = Chunk::new(
            "x",
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            0,
            1,
            0,
        );
        assert_eq!(chunk.path_string(), "A > B > C");

        let bare = Chunk::new("x", vec![], 0, 1, 0);
        assert_eq!(bare.path_string(), "");
    }
}
