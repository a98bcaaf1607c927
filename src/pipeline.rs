//! The end-to-end chunking pipeline.
//!
//! Drives the full sequence over a raw markdown document:
//!
//! ```text
//! normalize -> correct headings (optional) -> detect atomic regions
//!           -> hybrid chunk -> prepend metadata
//! ```
//!
//! Output is a list of strings, each a `<metadata>` block followed by the
//! chunk text, ready for embedding or retrieval indexing.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::atomic::{detect, DetectorConfig};
use crate::enhance::{enhance_headings, CorrectionProvider, LlmConfig, LlmCorrector};
use crate::error::{Error, Result};
use crate::hybrid::HybridChunker;
use crate::normalize::{normalize, NormalizeOptions};
use crate::{Chunk, Chunker};

/// Size bound for the hybrid chunker, in bytes.
pub const MAX_CHUNK_LENGTH: usize = 2000;

/// A chunking request.
///
/// Deserializes from the JSON invocation format; every field but
/// `input_text` is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkRequest {
    /// The raw markdown document. Required; must be non-empty.
    pub input_text: String,
    /// Document title for the metadata block.
    pub file_title: Option<String>,
    /// Collapse runs of spaces and blank lines.
    pub remove_extra_spaces: bool,
    /// Strip bare URLs and email addresses.
    pub remove_urls_emails: bool,
    /// Run the heading-correction stage. Requires `llm_api_base` and
    /// `llm_api_key`.
    pub enable_llm_enhancement: bool,
    /// Base URL of the OpenAI-compatible correction service.
    pub llm_api_base: Option<String>,
    /// Bearer token for the correction service.
    pub llm_api_key: Option<String>,
    /// Model name; defaults to the service default.
    pub llm_model: Option<String>,
}

impl ChunkRequest {
    /// A minimal request over `input_text` with all options off.
    #[must_use]
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
            ..Self::default()
        }
    }
}

/// Run the full pipeline.
///
/// When `enable_llm_enhancement` is set, a correction client is built
/// from the request's credentials; correction failures degrade to the
/// uncorrected text, but missing credentials are a configuration error.
///
/// # Errors
///
/// [`Error::MissingInput`] when `input_text` is empty, and
/// [`Error::MissingLlmCredentials`] when enhancement is requested
/// without both `llm_api_base` and `llm_api_key`.
pub fn run(request: &ChunkRequest) -> Result<Vec<String>> {
    if request.enable_llm_enhancement {
        let (Some(base), Some(key)) = (&request.llm_api_base, &request.llm_api_key) else {
            return Err(Error::MissingLlmCredentials);
        };

        let mut config = LlmConfig::new(base, key);
        if let Some(model) = &request.llm_model {
            config.model.clone_from(model);
        }
        match LlmCorrector::new(config) {
            Ok(corrector) => return run_with_provider(request, &corrector),
            Err(e) => {
                // Same fail-open contract as a failed request.
                warn!("could not build correction client, skipping enhancement: {e}");
            }
        }
    }

    run_stages(request, None)
}

/// Run the pipeline with a caller-supplied correction provider.
///
/// Skips the credential check entirely; the provider is used whenever
/// `enable_llm_enhancement` is set.
///
/// # Errors
///
/// [`Error::MissingInput`] when `input_text` is empty.
pub fn run_with_provider(
    request: &ChunkRequest,
    provider: &dyn CorrectionProvider,
) -> Result<Vec<String>> {
    run_stages(request, Some(provider))
}

fn run_stages(
    request: &ChunkRequest,
    provider: Option<&dyn CorrectionProvider>,
) -> Result<Vec<String>> {
    if request.input_text.is_empty() {
        return Err(Error::MissingInput);
    }

    let options = NormalizeOptions {
        collapse_whitespace: request.remove_extra_spaces,
        strip_urls_emails: request.remove_urls_emails,
    };
    let text = normalize(&request.input_text, &options);

    let text = match provider {
        Some(provider) if request.enable_llm_enhancement => enhance_headings(&text, provider),
        _ => text,
    };

    // Regions are detected on the corrected text, the same coordinate
    // space the chunker sees.
    let regions = detect(&text, &DetectorConfig::default());
    debug!("detected {} atomic regions", regions.len());

    let chunker = HybridChunker::new(1, MAX_CHUNK_LENGTH, regions);
    let chunks = chunker.chunk(&text);
    debug!("produced {} chunks", chunks.len());

    Ok(chunks
        .iter()
        .map(|chunk| render_chunk(request.file_title.as_deref(), chunk))
        .collect())
}

fn render_chunk(file_title: Option<&str>, chunk: &Chunk) -> String {
    format!(
        "{}\n{}",
        metadata_block(file_title, &chunk.heading_path),
        chunk.text
    )
}

/// Render the metadata block prepended to each chunk.
///
/// ```text
/// <metadata>
/// <Title>report.pdf</Title>
/// <Headings>Intro > Background</Headings>
/// </metadata>
/// ```
///
/// Title and headings lines are each omitted when absent; with neither,
/// the block is just the two wrapper lines.
#[must_use]
pub fn metadata_block(file_title: Option<&str>, heading_path: &[String]) -> String {
    let mut block = String::from("<metadata>\n");
    if let Some(title) = file_title {
        block.push_str(&format!("<Title>{title}</Title>\n"));
    }
    if !heading_path.is_empty() {
        block.push_str(&format!("<Headings>{}</Headings>\n", heading_path.join(" > ")));
    }
    block.push_str("</metadata>");
    block
}
