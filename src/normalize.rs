//! Cleanup pass for raw extractor output.
//!
//! Layout-extraction pipelines emit markdown with predictable damage:
//! literal `\n` escape sequences instead of line breaks, control characters,
//! stray page numbers, table-of-contents leader dots, and inconsistent
//! whitespace. This pass repairs those artifacts once, up front, so every
//! later stage (atomic-region detection, heading correction, chunking) can
//! share a single stable coordinate space.
//!
//! ## Pass Order
//!
//! ```text
//! 1. Invalid characters     (always)
//! 2. Escaped newlines       (always)
//! 3. URL/email removal      (opt-in)
//! 4. Whitespace collapse    (opt-in, math/table spans protected)
//! 5. Extractor artifacts    (always)
//! 6. Leading punctuation    (always)
//! ```
//!
//! The whole pass is a pure function and idempotent: running it twice
//! produces the same text as running it once.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Options for [`normalize`].
///
/// Both switches default to off; invalid-character repair, escaped-newline
/// conversion, and artifact removal always run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Collapse runs of whitespace (3+ newlines to 2, horizontal runs to
    /// one space, trailing spaces stripped). Math and HTML-table spans are
    /// left untouched.
    pub collapse_whitespace: bool,
    /// Remove email addresses and bare URLs. URLs inside markdown image
    /// syntax survive.
    pub strip_urls_emails: bool,
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+").expect("valid email regex")
});
static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\((https?://[^\s)]+)\)").expect("valid image regex")
});
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("valid url regex"));
static DISPLAY_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$[\s\S]*?\$\$").expect("valid display math regex"));
static INLINE_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[^$]+\$").expect("valid inline math regex"));
static HTML_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table>.*?</table>").expect("valid table regex"));
static EXTRA_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));
// The full Unicode horizontal-space set: tab, form feed, carriage return,
// ASCII space, no-break space, Ogham space, Mongolian vowel separator,
// the U+2000 block, narrow no-break space, medium mathematical space,
// and the CJK ideographic space.
static EXTRA_SPACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\t\f\r \u{00a0}\u{1680}\u{180e}\u{2000}-\u{200a}\u{202f}\u{205f}\u{3000}]{2,}")
        .expect("valid space regex")
});
static TRAILING_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +\n").expect("valid trailing space regex"));
static PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[0-9]{1,3}\n\n").expect("valid page number regex"));
static TOC_DOTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{5,}").expect("valid leader dots regex"));

/// Normalize raw extractor markdown into clean text.
///
/// Deterministic and total: no input fails, and the result is a fixed
/// point (`normalize(normalize(x)) == normalize(x)`).
///
/// ```rust
/// use strata::{normalize, NormalizeOptions};
///
/// let raw = "# Title\\n\\nBody text.";
/// let text = normalize(raw, &NormalizeOptions::default());
/// assert_eq!(text, "# Title\n\nBody text.");
/// ```
#[must_use]
pub fn normalize(raw: &str, options: &NormalizeOptions) -> String {
    let mut text = remove_invalid_characters(raw);
    text = unescape_newlines(&text);

    if options.strip_urls_emails {
        text = remove_urls_and_emails(&text);
    }
    if options.collapse_whitespace {
        text = collapse_whitespace(&text);
    }

    text = remove_artifacts(&text);
    trim_leading_punctuation(&text)
}

/// Strip control characters and known invalid markers.
fn remove_invalid_characters(text: &str) -> String {
    let text = text.replace("<|", "<").replace("|>", ">");
    text.chars()
        .filter(|&c| {
            let invalid = matches!(c, '\u{00}'..='\u{08}' | '\u{0b}' | '\u{0c}' | '\u{0e}'..='\u{1f}')
                || matches!(c, '\u{7f}' | '\u{fffe}' | '\u{feff}');
            !invalid
        })
        .collect()
}

/// Convert literal `\n` escape sequences into real line breaks.
///
/// A backslash that is itself escaped does not start a newline escape: for
/// a run of backslashes followed by `n`, only an odd-length run converts
/// (the trailing single backslash pairs with the `n`; the rest pass
/// through unchanged).
fn unescape_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let mut run = 1usize;
        while chars.peek() == Some(&'\\') {
            chars.next();
            run += 1;
        }

        if run % 2 == 1 && chars.peek() == Some(&'n') {
            chars.next();
            for _ in 0..run - 1 {
                out.push('\\');
            }
            out.push('\n');
        } else {
            for _ in 0..run {
                out.push('\\');
            }
        }
    }

    out
}

/// Remove emails and bare URLs, keeping markdown image references intact.
///
/// Image URLs go through a protect-placeholder-restore round trip so the
/// bare-URL strip cannot eat them.
fn remove_urls_and_emails(text: &str) -> String {
    let text = EMAIL.replace_all(text, "");

    let mut protected: Vec<String> = Vec::new();
    let text = MARKDOWN_IMAGE.replace_all(&text, |caps: &regex::Captures<'_>| {
        let placeholder = format!("__MD_IMAGE_URL_{}__", protected.len());
        protected.push(caps[2].to_string());
        format!("![{}]({placeholder})", &caps[1])
    });

    let mut text = BARE_URL.replace_all(&text, "").into_owned();

    for (i, url) in protected.iter().enumerate() {
        text = text.replace(&format!("__MD_IMAGE_URL_{i}__"), url);
    }

    text
}

/// Collapse whitespace runs outside math and table spans.
fn collapse_whitespace(text: &str) -> String {
    let mut protected: Vec<String> = Vec::new();
    let mut text = text.to_string();

    for pattern in [&*DISPLAY_MATH, &*INLINE_MATH, &*HTML_TABLE] {
        text = pattern
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let placeholder = format!("<<<PROTECTED_BLOCK_{}>>>", protected.len());
                protected.push(caps[0].to_string());
                placeholder
            })
            .into_owned();
    }

    text = EXTRA_NEWLINES.replace_all(&text, "\n\n").into_owned();
    text = EXTRA_SPACES.replace_all(&text, " ").into_owned();
    text = TRAILING_SPACES.replace_all(&text, "\n").into_owned();

    for (i, block) in protected.iter().enumerate() {
        text = text.replace(&format!("<<<PROTECTED_BLOCK_{i}>>>"), block);
    }

    text
}

/// Drop table-of-contents leader dots and standalone page-number lines.
///
/// Page-number removal iterates to a fixed point: the match consumes the
/// blank line that introduces the next page number, so consecutive
/// page-number lines need one iteration each. Dots go first, since
/// removing a leader can expose a bare number line.
fn remove_artifacts(text: &str) -> String {
    let mut text = TOC_DOTS.replace_all(text, "").into_owned();
    loop {
        let next = match PAGE_NUMBER.replace_all(&text, "\n\n") {
            Cow::Owned(next) => next,
            Cow::Borrowed(_) => break,
        };
        text = next;
    }
    text
}

/// Strip leading full stops from each paragraph, dropping paragraphs that
/// become empty.
fn trim_leading_punctuation(text: &str) -> String {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(|para| {
            let mut para = para;
            while let Some(rest) = para.strip_prefix('.').or_else(|| para.strip_prefix('。')) {
                para = rest.trim();
            }
            para
        })
        .filter(|para| !para.is_empty())
        .collect();

    paragraphs.join("\n\n")
}
