//! Heading-hierarchy correction through an external language model.
//!
//! Layout extractors flatten heading levels (everything becomes `#`) and
//! miss headings that were styled rather than marked. This stage collects
//! explicit headings plus heuristic "potential" headings, asks an
//! OpenAI-compatible chat service to assign real levels, and rewrites the
//! markers in place.
//!
//! ## Fail-Open Contract
//!
//! The stage is strictly best-effort: a transport error, timeout, or
//! malformed response leaves the input text unchanged and logs a warning.
//! Nothing here can fail the pipeline, and the chunkers never see this
//! module — corrected text is handed to them as a plain input.
//!
//! The network client lives behind [`CorrectionProvider`], so hosts and
//! tests can inject their own correction source.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::heading::{explicit_headings, Heading};

/// Level sentinel meaning "this is not a heading at all".
pub const NOT_A_HEADING: u8 = 7;

/// Default model when the caller does not name one.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default request timeout in seconds. Correction prompts over large
/// documents can be slow to complete.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

static SENTENCE_FINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。；、.;]$").expect("valid sentence-final regex"));
static SHORT_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.{0,5}[，,]\s*$").expect("valid short-comma regex"));
static PAREN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[(（]?[0-9]+[)）]?\s*$").expect("valid paren-number regex"));
static TRAILING_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[：:]$").expect("valid trailing-colon regex"));
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*(\[[\s\S]*?\])\s*```").expect("valid fenced json regex")
});
static BARE_JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[\s\S]*?\]").expect("valid json array regex"));

/// A corrected heading level from the correction service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectedHeading {
    /// Zero-based position in the heading list sent for correction.
    pub index: usize,
    /// Corrected level: 1-6, or [`NOT_A_HEADING`].
    pub level: u8,
    /// The heading title (unchanged by correction).
    pub title: String,
}

/// Failures of the correction stage. All of them degrade to a no-op at
/// the [`enhance_headings`] boundary.
#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    /// Client construction failed (bad key format, TLS setup, ...).
    #[error("correction client configuration: {0}")]
    Config(String),

    /// Transport-level failure, including timeouts.
    #[error("correction request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the service.
    #[error("correction service returned status {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// Response body, for the log line.
        body: String,
    },

    /// The response carried no parseable JSON array of corrections.
    #[error("malformed correction response: {0}")]
    MalformedResponse(String),

    /// The service returned a different number of corrections than
    /// headings sent. Partial correction sets are never applied.
    #[error("correction count mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Number of headings sent.
        expected: usize,
        /// Number of corrections returned.
        got: usize,
    },
}

/// A source of heading-level corrections.
///
/// The production implementation is [`LlmCorrector`]; tests and embedding
/// hosts can supply their own.
pub trait CorrectionProvider {
    /// Produce one correction per heading, in the same order.
    ///
    /// # Errors
    ///
    /// Any error makes the caller keep the original text.
    fn correct(&self, headings: &[Heading]) -> Result<Vec<CorrectedHeading>, EnhanceError>;
}

/// Configuration for the OpenAI-compatible correction client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base, e.g. `https://api.openai.com/v1`. The client appends
    /// `/chat/completions`.
    pub api_base: String,
    /// Bearer token.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Request timeout in seconds. One attempt, no retries.
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Config with the default model and timeout.
    #[must_use]
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct CorrectionItem {
    #[serde(default)]
    level: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    index: Option<usize>,
    #[serde(default)]
    #[allow(dead_code)]
    title: Option<String>,
}

const SYSTEM_PROMPT: &str = "You are a document structure expert. Analyze heading hierarchies \
     and correct heading levels to reflect proper document structure.";

/// Blocking HTTP client for an OpenAI-compatible chat-completions service.
#[derive(Debug)]
pub struct LlmCorrector {
    client: reqwest::blocking::Client,
    config: LlmConfig,
}

impl LlmCorrector {
    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`EnhanceError::Config`] when the HTTP client cannot be
    /// constructed (for example, an API key that is not a valid header
    /// value).
    pub fn new(config: LlmConfig) -> Result<Self, EnhanceError> {
        use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = format!("Bearer {}", config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| EnhanceError::Config(format!("invalid API key: {e}")))?,
        );

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EnhanceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

impl CorrectionProvider for LlmCorrector {
    fn correct(&self, headings: &[Heading]) -> Result<Vec<CorrectedHeading>, EnhanceError> {
        let prompt = build_prompt(headings);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.1,
            max_tokens: 8192,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        debug!("requesting correction of {} headings from {url}", headings.len());

        let response = self.client.post(&url).json(&request).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EnhanceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json()?;
        let content = chat
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| EnhanceError::MalformedResponse("no choices in response".into()))?;

        parse_corrections(content, headings)
    }
}

/// Enumerate headings into the correction prompt.
fn build_prompt(headings: &[Heading]) -> String {
    let mut listing = String::new();
    for (i, heading) in headings.iter().enumerate() {
        if heading.is_potential {
            listing.push_str(&format!("{}. [Potential] {}\n", i + 1, heading.title));
        } else {
            listing.push_str(&format!(
                "{}. {} {}\n",
                i + 1,
                "#".repeat(usize::from(heading.level)),
                heading.title
            ));
        }
    }

    format!(
        "I have a markdown document with the following headings. Some headings are explicitly \
         marked with # symbols, while others are potential headings (marked with [Potential]) \
         that were detected as short single-line text.\n\n\
         Please analyze the content and semantic relationships of these headings, then assign \
         appropriate heading levels to reflect the proper document structure.\n\n\
         Current headings:\n{listing}\n\
         Please return a JSON array with corrected levels. Each item should have:\n\
         - \"index\": the heading number (1-based)\n\
         - \"level\": the corrected heading level\n\
           - Use 1-6 for actual headings (H1-H6)\n\
           - Use 7 to indicate this is NOT a heading (e.g., it's a sentence fragment, formula \
         reference, or normal text)\n\
         - \"title\": the original title (unchanged)\n\n\
         Pay attention to fundamental logic, such as ensuring adjacent headings at the same \
         level share the same hierarchical structure, and maintain contextual coherence and \
         logical consistency.\n\n\
         Important: Use level=7 for items that are clearly NOT headings, such as:\n\
         - Sentence fragments ending with punctuation (。；：)\n\
         - Pure symbols or numbers like \"(1)\", \"式中，\"\n\
         - Mathematical formulas or variable definitions\n\
         - Lead-in phrases like \"...包括：\" or \"...如下：\"\n\n\
         Example format:\n\
         ```json\n\
         [\n\
           {{\"index\": 1, \"level\": 1, \"title\": \"Introduction\"}},\n\
           {{\"index\": 2, \"level\": 2, \"title\": \"Background\"}},\n\
           {{\"index\": 3, \"level\": 7, \"title\": \"式中，\"}},\n\
           {{\"index\": 4, \"level\": 2, \"title\": \"Objectives\"}}\n\
         ]\n\
         ```\n\n\
         Respond with ONLY the JSON array, no other text."
    )
}

/// Extract and validate the correction array from a model reply.
fn parse_corrections(
    content: &str,
    headings: &[Heading],
) -> Result<Vec<CorrectedHeading>, EnhanceError> {
    let json = FENCED_JSON
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .or_else(|| BARE_JSON_ARRAY.find(content).map(|m| m.as_str()))
        .ok_or_else(|| EnhanceError::MalformedResponse("no JSON array found".into()))?;

    let items: Vec<CorrectionItem> = serde_json::from_str(json)
        .map_err(|e| EnhanceError::MalformedResponse(e.to_string()))?;

    if items.len() != headings.len() {
        return Err(EnhanceError::LengthMismatch {
            expected: headings.len(),
            got: items.len(),
        });
    }

    Ok(items
        .iter()
        .zip(headings)
        .enumerate()
        .map(|(index, (item, heading))| {
            // Out-of-range or missing levels fall back to the original.
            let level = match item.level {
                Some(level @ 1..=7) => level as u8,
                _ => heading.level,
            };
            CorrectedHeading {
                index,
                level,
                title: heading.title.clone(),
            }
        })
        .collect())
}

/// Collect explicit and potential headings in document order.
///
/// Potential headings are single-line paragraphs that read like titles: no
/// sentence-final punctuation, not a bare number, not dot leaders or
/// formula fragments, not a lead-in ending with a colon; and short —
/// at most 30 characters when the line contains CJK ideographs, otherwise
/// 1 to 20 words.
#[must_use]
pub fn collect_headings(text: &str) -> Vec<Heading> {
    let mut headings = explicit_headings(text);

    let mut offset = 0;
    for para in text.split("\n\n") {
        let line = para.trim();
        let position = offset + (para.len() - para.trim_start().len());
        offset += para.len() + 2;

        if line.is_empty() || line.contains('\n') || line.starts_with('#') {
            continue;
        }
        if !looks_like_heading(line) {
            continue;
        }
        if headings.iter().any(|h| h.position == position) {
            continue;
        }

        headings.push(Heading {
            level: 1, // placeholder pending correction
            title: line.to_string(),
            position,
            source: line.to_string(),
            is_potential: true,
        });
    }

    headings.sort_by_key(|h| h.position);
    headings
}

fn looks_like_heading(line: &str) -> bool {
    if SENTENCE_FINAL.is_match(line)
        || SHORT_COMMA.is_match(line)
        || PAREN_NUMBER.is_match(line)
        || TRAILING_COLON.is_match(line)
    {
        return false;
    }
    // Dot leaders and ellipses mark table-of-contents lines.
    if line.matches('.').count() > 3 || line.matches('．').count() > 2 {
        return false;
    }
    // Math-heavy lines are formulas, not titles.
    if line.matches('$').count() >= 2 || line.matches('\\').count() > 2 {
        return false;
    }

    let cjk = line
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    if cjk > 0 {
        line.chars().count() <= 30
    } else {
        let words = line.unicode_words().count();
        (1..=20).contains(&words)
    }
}

/// Correct heading levels in `text`, best-effort.
///
/// On any provider failure the input is returned unchanged; this stage
/// never aborts the pipeline.
#[must_use]
pub fn enhance_headings(text: &str, provider: &dyn CorrectionProvider) -> String {
    let headings = collect_headings(text);
    if headings.is_empty() {
        return text.to_string();
    }
    debug!("collected {} headings for correction", headings.len());

    match provider.correct(&headings) {
        Ok(corrections) if corrections.len() == headings.len() => {
            apply_corrections(text, &headings, &corrections)
        }
        Ok(corrections) => {
            warn!(
                "correction set size {} does not match {} headings, keeping original text",
                corrections.len(),
                headings.len()
            );
            text.to_string()
        }
        Err(e) => {
            warn!("heading correction failed, keeping original text: {e}");
            text.to_string()
        }
    }
}

/// Rewrite heading markers according to a validated correction set.
///
/// Walks the document once, copying the text between headings verbatim
/// and substituting each heading span as directed. Headings arrive in
/// ascending position order and never overlap.
fn apply_corrections(
    text: &str,
    headings: &[Heading],
    corrections: &[CorrectedHeading],
) -> String {
    // Zipping a short correction set would silently rewrite the wrong
    // spans; callers must validate lengths first.
    debug_assert_eq!(
        headings.len(),
        corrections.len(),
        "one correction per heading"
    );

    let mut result = String::with_capacity(text.len());
    let mut cursor = 0;

    for (heading, correction) in headings.iter().zip(corrections) {
        result.push_str(&text[cursor..heading.position]);
        cursor = heading.position + heading.source.len();

        if correction.level == NOT_A_HEADING {
            // Only inferred headings are deletable; explicit ones stay.
            if !heading.is_potential {
                result.push_str(&heading.source);
            }
        } else if heading.is_potential || correction.level != heading.level {
            result.push_str(&"#".repeat(usize::from(correction.level)));
            result.push(' ');
            result.push_str(&heading.title);
        } else {
            result.push_str(&heading.source);
        }
    }

    result.push_str(&text[cursor..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Provider returning a canned correction set.
    struct FixedProvider(Vec<CorrectedHeading>);

    impl CorrectionProvider for FixedProvider {
        fn correct(&self, _headings: &[Heading]) -> Result<Vec<CorrectedHeading>, EnhanceError> {
            Ok(self.0.clone())
        }
    }

    /// Provider that always fails.
    struct FailingProvider;

    impl CorrectionProvider for FailingProvider {
        fn correct(&self, _headings: &[Heading]) -> Result<Vec<CorrectedHeading>, EnhanceError> {
            Err(EnhanceError::MalformedResponse("boom".into()))
        }
    }

    fn corrected(index: usize, level: u8, title: &str) -> CorrectedHeading {
        CorrectedHeading {
            index,
            level,
            title: title.to_string(),
        }
    }

    #[test]
    fn test_collect_explicit_and_potential() {
        let text = "# Intro\n\nSome body text that is long enough to not look like a title \
                    because it keeps going.\n\nSystem Design\n\nmore body.";
        let headings = collect_headings(text);

        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].title, "Intro");
        assert!(!headings[0].is_potential);
        assert_eq!(headings[1].title, "System Design");
        assert!(headings[1].is_potential);
        assert_eq!(
            &text[headings[1].position..headings[1].position + headings[1].source.len()],
            "System Design"
        );
    }

    #[test]
    fn test_potential_heading_filters() {
        assert!(looks_like_heading("System Design"));
        assert!(looks_like_heading("绪论"));

        // Sentence-final punctuation.
        assert!(!looks_like_heading("This ends with a period."));
        assert!(!looks_like_heading("到此为止。"));
        // Short comma fragment.
        assert!(!looks_like_heading("式中，"));
        // Bare numbering.
        assert!(!looks_like_heading("(1)"));
        assert!(!looks_like_heading("（5）"));
        // Dot leaders.
        assert!(!looks_like_heading("Chapter 1 . . . . 12"));
        // Formula fragments.
        assert!(!looks_like_heading("$x$ = $y$"));
        assert!(!looks_like_heading(r"\alpha \beta \gamma \delta"));
        // Lead-in colon.
        assert!(!looks_like_heading("包括以下内容："));
        assert!(!looks_like_heading("The steps are:"));
        // Too long for a CJK title.
        assert!(!looks_like_heading(&"字".repeat(31)));
        // Too many words for a Latin title.
        assert!(!looks_like_heading(
            "one two three four five six seven eight nine ten eleven twelve thirteen fourteen \
             fifteen sixteen seventeen eighteen nineteen twenty twentyone"
        ));
    }

    // Body paragraphs end with a full stop so the potential-heading
    // heuristic cannot pick them up.
    #[test]
    fn test_apply_level_change() {
        let text = "# Intro\n\nOpening prose.\n\n# Background\n\nClosing prose.";
        let headings = collect_headings(text);
        let corrections = vec![
            corrected(0, 1, "Intro"),
            corrected(1, 2, "Background"),
        ];

        let out = apply_corrections(text, &headings, &corrections);
        assert_eq!(out, "# Intro\n\nOpening prose.\n\n## Background\n\nClosing prose.");
    }

    #[test]
    fn test_apply_promotes_potential_heading() {
        let text = "# Intro\n\nOpening prose.\n\nSystem Design\n\nClosing prose.";
        let headings = collect_headings(text);
        assert_eq!(headings.len(), 2);
        assert!(headings[1].is_potential);

        let corrections = vec![
            corrected(0, 1, "Intro"),
            corrected(1, 2, "System Design"),
        ];
        let out = apply_corrections(text, &headings, &corrections);
        assert_eq!(out, "# Intro\n\nOpening prose.\n\n## System Design\n\nClosing prose.");
    }

    #[test]
    fn test_apply_deletes_rejected_potential() {
        let text = "# Intro\n\nOpening prose.\n\nShort Fragment\n\nClosing prose.";
        let headings = collect_headings(text);
        let corrections = vec![
            corrected(0, 1, "Intro"),
            corrected(1, NOT_A_HEADING, "Short Fragment"),
        ];

        let out = apply_corrections(text, &headings, &corrections);
        assert_eq!(out, "# Intro\n\nOpening prose.\n\n\n\nClosing prose.");
    }

    #[test]
    fn test_apply_never_deletes_explicit() {
        let text = "# Intro\n\nBody sentence stays.";
        let headings = collect_headings(text);
        let corrections = vec![corrected(0, NOT_A_HEADING, "Intro")];

        let out = apply_corrections(text, &headings, &corrections);
        assert_eq!(out, text);
    }

    #[test]
    fn test_apply_tracks_offsets_across_edits() {
        let text = "# A\n\nFirst part.\n\n# B\n\nSecond part.\n\n# C\n\nThird part.";
        let headings = collect_headings(text);
        let corrections = vec![
            corrected(0, 3, "A"),
            corrected(1, 2, "B"),
            corrected(2, 4, "C"),
        ];

        let out = apply_corrections(text, &headings, &corrections);
        assert_eq!(
            out,
            "### A\n\nFirst part.\n\n## B\n\nSecond part.\n\n#### C\n\nThird part."
        );
    }

    #[test]
    fn test_enhance_failure_returns_original() {
        let text = "# A\n\nSome prose.";
        assert_eq!(enhance_headings(text, &FailingProvider), text);
    }

    #[test]
    fn test_enhance_length_mismatch_returns_original() {
        let text = "# A\n\nFirst prose.\n\n# B\n\nSecond prose.";
        let provider = FixedProvider(vec![corrected(0, 2, "A")]);
        assert_eq!(enhance_headings(text, &provider), text);
    }

    #[test]
    fn test_enhance_no_headings_is_noop() {
        let text = "nothing that could count as a heading because every line runs long and \
                    reads like prose, with plenty of words to spare and more keep arriving \
                    until twenty is well exceeded here.";
        assert_eq!(enhance_headings(text, &FailingProvider), text);
    }

    #[test]
    fn test_parse_fenced_response() {
        let headings = collect_headings("# A\n\nFirst prose.\n\n# B\n\nSecond prose.");
        assert_eq!(headings.len(), 2);
        let reply = "Sure:\n```json\n[\n {\"index\":1,\"level\":1,\"title\":\"A\"},\n \
                     {\"index\":2,\"level\":2,\"title\":\"B\"}\n]\n```";
        let corrections = parse_corrections(reply, &headings).unwrap();

        assert_eq!(corrections.len(), 2);
        assert_eq!(corrections[0].level, 1);
        assert_eq!(corrections[1].level, 2);
    }

    #[test]
    fn test_parse_bare_array_response() {
        let headings = collect_headings("# A\n\nSome prose.");
        let reply = r#"[{"index":1,"level":3,"title":"A"}]"#;
        let corrections = parse_corrections(reply, &headings).unwrap();
        assert_eq!(corrections[0].level, 3);
    }

    #[test]
    fn test_parse_invalid_level_falls_back() {
        let headings = collect_headings("## A\n\nSome prose.");
        let reply = r#"[{"index":1,"level":42,"title":"A"}]"#;
        let corrections = parse_corrections(reply, &headings).unwrap();
        assert_eq!(corrections[0].level, 2);
    }

    #[test]
    fn test_parse_length_mismatch_rejected() {
        let headings = collect_headings("# A\n\nFirst prose.\n\n# B\n\nSecond prose.");
        let reply = r#"[{"index":1,"level":1,"title":"A"}]"#;
        let err = parse_corrections(reply, &headings).unwrap_err();
        assert!(matches!(
            err,
            EnhanceError::LengthMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_parse_garbage_rejected() {
        let headings = collect_headings("# A\n\nSome prose.");
        assert!(matches!(
            parse_corrections("no json here", &headings),
            Err(EnhanceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_build_prompt_lists_headings() {
        let text = "# Intro\n\nOpening prose.\n\nSystem Design\n\nClosing prose.";
        let headings = collect_headings(text);
        let prompt = build_prompt(&headings);

        assert!(prompt.contains("1. # Intro"));
        assert!(prompt.contains("2. [Potential] System Design"));
        assert!(prompt.contains("Respond with ONLY the JSON array"));
    }
}
