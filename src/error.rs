//! Error types for strata.

/// Errors surfaced to the caller before the pipeline runs.
///
/// These are input-validation failures only. Degradable stage failures
/// (the heading-correction call) never appear here; that stage falls back
/// to the uncorrected text instead of failing the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request carried no input text.
    #[error("input_text is required")]
    MissingInput,

    /// LLM enhancement was requested without both an API base and key.
    #[error("LLM enhancement requires both llm_api_base and llm_api_key")]
    MissingLlmCredentials,
}

/// Result type for strata operations.
pub type Result<T> = std::result::Result<T, Error>;
