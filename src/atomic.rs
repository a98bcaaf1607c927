//! Detection of indivisible content spans.
//!
//! Some document content is only meaningful whole: an HTML table split in
//! half is garbage in both halves, and a numbered formula separated from
//! its variable definitions loses its meaning. This module locates those
//! spans ahead of chunking so the splitters can route boundaries around
//! them.
//!
//! ## Region Kinds
//!
//! - **Formula block**: a numbered heading, its display-math block, and
//!   (when present) the variable-definitions section that follows.
//! - **Table** / **table with caption**: an `<table>...</table>` span,
//!   optionally together with the heading line that captions it.
//! - **Code block**: a fenced ``` span (off by default; extractor output
//!   rarely contains them).
//!
//! Overlapping detections are merged into a single region whose content is
//! re-sliced from the source text, so a merged region is always an exact
//! substring of the document.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static FORMULA_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^# [0-9]+[)）][^\n]*$").expect("valid formula head regex"));
static CAPTIONED_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ims)^#{1,6} [^\n]*(?:表|table)[^\n]*\n\n<table>.*?</table>")
        .expect("valid captioned table regex")
});
static BARE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table>.*?</table>").expect("valid table regex"));
static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid fenced code regex"));

/// Lead-in marking a variable-definitions section after a formula.
const VARIABLE_DEFS_LEAD: &str = "\n\n式中";

/// What kind of content an atomic region holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomicKind {
    /// Numbered heading + display math + optional variable definitions.
    FormulaBlock,
    /// A bare `<table>...</table>` span.
    Table,
    /// A caption heading together with its table.
    TableWithCaption,
    /// A fenced code block.
    CodeBlock,
    /// Two or more overlapping regions combined into one.
    Merged(Vec<AtomicKind>),
}

impl AtomicKind {
    /// Combine two kinds when their regions overlap, flattening nested
    /// merges.
    fn merge(self, other: Self) -> Self {
        let mut kinds = match self {
            Self::Merged(kinds) => kinds,
            kind => vec![kind],
        };
        match other {
            Self::Merged(more) => kinds.extend(more),
            kind => kinds.push(kind),
        }
        Self::Merged(kinds)
    }
}

impl fmt::Display for AtomicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormulaBlock => f.write_str("formula_block"),
            Self::Table => f.write_str("table"),
            Self::TableWithCaption => f.write_str("table_with_caption"),
            Self::CodeBlock => f.write_str("code_block"),
            Self::Merged(kinds) => {
                for (i, kind) in kinds.iter().enumerate() {
                    if i > 0 {
                        f.write_str("+")?;
                    }
                    write!(f, "{kind}")?;
                }
                Ok(())
            }
        }
    }
}

/// A text span that must never be split across chunk boundaries.
///
/// Regions are produced once per document by [`detect`] and are read-only
/// afterward; the chunkers only query them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicRegion {
    /// Byte offset where the region starts.
    pub start: usize,
    /// Byte offset where the region ends (exclusive).
    pub end: usize,
    /// What the region holds.
    pub kind: AtomicKind,
    /// The region text, always an exact slice of the source document.
    pub content: String,
}

impl AtomicRegion {
    fn from_span(text: &str, start: usize, end: usize, kind: AtomicKind) -> Self {
        Self {
            start,
            end,
            kind,
            content: text[start..end].to_string(),
        }
    }

    /// Whether `position` falls inside this region.
    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        self.start <= position && position < self.end
    }

    /// The byte span of this region in the source document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// The length of this region in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the region spans no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Which detectors run.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Protect numbered formula blocks.
    pub formulas: bool,
    /// Protect HTML tables (captioned or bare).
    pub tables: bool,
    /// Protect fenced code blocks. Off by default.
    pub code_blocks: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            formulas: true,
            tables: true,
            code_blocks: false,
        }
    }
}

/// Detect all atomic regions in `text`.
///
/// The result is sorted ascending by start and non-overlapping: any two
/// detections that overlap are merged into one region covering both, with
/// a [`AtomicKind::Merged`] kind and content re-sliced from the text.
#[must_use]
pub fn detect(text: &str, config: &DetectorConfig) -> Vec<AtomicRegion> {
    let mut regions = Vec::new();

    if config.formulas {
        detect_formula_blocks(text, &mut regions);
    }
    if config.tables {
        detect_tables(text, &mut regions);
    }
    if config.code_blocks {
        detect_code_blocks(text, &mut regions);
    }

    regions.sort_by_key(|region| region.start);
    merge_overlapping(text, regions)
}

/// The region containing `position`, if any.
///
/// A linear scan: region counts per document are small, so no index
/// structure is warranted.
#[must_use]
pub fn region_at(regions: &[AtomicRegion], position: usize) -> Option<&AtomicRegion> {
    regions.iter().find(|region| region.contains(position))
}

/// Whether `position` falls inside any region.
#[must_use]
pub fn in_region(regions: &[AtomicRegion], position: usize) -> bool {
    region_at(regions, position).is_some()
}

/// Formula blocks: a `# N）title` heading, a blank line, a `$$...$$`
/// display block, and optionally a variable-definitions section extending
/// to the next heading line or end of text.
fn detect_formula_blocks(text: &str, regions: &mut Vec<AtomicRegion>) {
    for head in FORMULA_HEAD.find_iter(text) {
        let after_head = head.end();
        let Some(math_body) = text[after_head..].strip_prefix("\n\n$$") else {
            continue;
        };
        let Some(close) = math_body.find("$$") else {
            continue;
        };
        let math_end = after_head + 2 + 2 + close + 2;

        let end = if text[math_end..].starts_with(VARIABLE_DEFS_LEAD) {
            // Definitions run until the next heading line. The terminating
            // newline stays outside the region.
            match text[math_end..].find("\n#") {
                Some(offset) => math_end + offset,
                None => text.len(),
            }
        } else {
            math_end
        };

        regions.push(AtomicRegion::from_span(
            text,
            head.start(),
            end,
            AtomicKind::FormulaBlock,
        ));
    }
}

/// Tables, captioned ones first so the bare pass can skip spans already
/// covered.
fn detect_tables(text: &str, regions: &mut Vec<AtomicRegion>) {
    let mut captioned: Vec<(usize, usize)> = Vec::new();

    for m in CAPTIONED_TABLE.find_iter(text) {
        captioned.push((m.start(), m.end()));
        regions.push(AtomicRegion::from_span(
            text,
            m.start(),
            m.end(),
            AtomicKind::TableWithCaption,
        ));
    }

    for m in BARE_TABLE.find_iter(text) {
        let covered = captioned
            .iter()
            .any(|&(start, end)| start <= m.start() && m.start() < end);
        if !covered {
            regions.push(AtomicRegion::from_span(
                text,
                m.start(),
                m.end(),
                AtomicKind::Table,
            ));
        }
    }
}

fn detect_code_blocks(text: &str, regions: &mut Vec<AtomicRegion>) {
    for m in FENCED_CODE.find_iter(text) {
        regions.push(AtomicRegion::from_span(
            text,
            m.start(),
            m.end(),
            AtomicKind::CodeBlock,
        ));
    }
}

/// Fold a sorted region list, combining any region that starts before the
/// previous one ends. Merged content is re-sliced from the source text by
/// the merged span, so it is correct for any overlap shape.
fn merge_overlapping(text: &str, regions: Vec<AtomicRegion>) -> Vec<AtomicRegion> {
    let mut merged: Vec<AtomicRegion> = Vec::with_capacity(regions.len());

    for region in regions {
        match merged.last_mut() {
            Some(last) if region.start < last.end => {
                let end = last.end.max(region.end);
                let kind = last.kind.clone().merge(region.kind);
                *last = AtomicRegion::from_span(text, last.start, end, kind);
            }
            _ => merged.push(region),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMULA_DOC: &str =
        "# 1）应力计算\n\n$$\n\\sigma = F / A\n$$\n\n式中，\nF 为载荷；\nA 为截面积；\n\n# 下一节\n\n正文";

    #[test]
    fn test_formula_block_with_definitions() {
        let regions = detect(FORMULA_DOC, &DetectorConfig::default());
        assert_eq!(regions.len(), 1);

        let region = &regions[0];
        assert_eq!(region.kind, AtomicKind::FormulaBlock);
        assert_eq!(region.start, 0);
        assert!(region.content.starts_with("# 1）应力计算"));
        assert!(region.content.contains("式中"));
        assert!(region.content.ends_with("A 为截面积；\n"));
        // The next heading is outside the region.
        assert!(!region.content.contains("下一节"));
    }

    #[test]
    fn test_formula_block_without_definitions_ends_at_math() {
        let text = "# 2）公式\n\n$$\ne = mc^2\n$$\n\n普通段落继续。";
        let regions = detect(text, &DetectorConfig::default());
        assert_eq!(regions.len(), 1);
        assert!(regions[0].content.ends_with("$$"));
        assert!(!regions[0].content.contains("普通段落"));
    }

    #[test]
    fn test_plain_numbered_heading_not_a_formula() {
        let text = "# 3）标题\n\n没有公式的正文。";
        let regions = detect(text, &DetectorConfig::default());
        assert!(regions.is_empty());
    }

    #[test]
    fn test_bare_table() {
        let text = "before\n\n<table><tr><td>x</td></tr></table>\n\nafter";
        let regions = detect(text, &DetectorConfig::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, AtomicKind::Table);
        assert_eq!(&text[regions[0].start..regions[0].end], regions[0].content);
    }

    #[test]
    fn test_captioned_table_takes_precedence() {
        let text = "# 表1 结果对比\n\n<table><tr><td>x</td></tr></table>\n\nafter";
        let regions = detect(text, &DetectorConfig::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, AtomicKind::TableWithCaption);
        assert!(regions[0].content.starts_with("# 表1"));
    }

    #[test]
    fn test_english_caption_keyword_case_insensitive() {
        let text = "## Table 3: results\n\n<TABLE><tr><td>x</td></tr></TABLE>";
        let regions = detect(text, &DetectorConfig::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, AtomicKind::TableWithCaption);
    }

    #[test]
    fn test_code_blocks_off_by_default() {
        let text = "```rust\nfn main() {}\n```";
        assert!(detect(text, &DetectorConfig::default()).is_empty());

        let config = DetectorConfig {
            code_blocks: true,
            ..DetectorConfig::default()
        };
        let regions = detect(text, &config);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, AtomicKind::CodeBlock);
    }

    #[test]
    fn test_merge_overlapping_regions() {
        let text = "# 表4 参数\n\n<table><tr><td>y</td></tr></table>";
        // Force an overlap by detecting the same span twice.
        let mut regions = Vec::new();
        detect_tables(text, &mut regions);
        detect_tables(text, &mut regions);
        regions.sort_by_key(|r| r.start);
        let merged = merge_overlapping(text, regions);

        assert_eq!(merged.len(), 1);
        assert_eq!(&text[merged[0].start..merged[0].end], merged[0].content);
        assert!(matches!(merged[0].kind, AtomicKind::Merged(_)));
        assert_eq!(merged[0].kind.to_string(), "table_with_caption+table_with_caption");
    }

    #[test]
    fn test_sorted_and_disjoint() {
        let text = "<table><tr><td>a</td></tr></table>\n\ntext\n\n<table><tr><td>b</td></tr></table>";
        let regions = detect(text, &DetectorConfig::default());
        assert_eq!(regions.len(), 2);
        assert!(regions[0].end <= regions[1].start);
    }

    #[test]
    fn test_region_queries() {
        let text = "pad\n\n<table><tr><td>a</td></tr></table>\n\npad";
        let regions = detect(text, &DetectorConfig::default());
        let region = &regions[0];

        assert!(in_region(&regions, region.start));
        assert!(in_region(&regions, region.end - 1));
        assert!(!in_region(&regions, region.end));
        assert!(!in_region(&regions, 0));
        assert_eq!(region_at(&regions, region.start + 3).map(|r| r.start), Some(region.start));
        assert!(region_at(&regions, 0).is_none());
    }
}
