//! Recovery reasons for the pipeline stages.
//!
//! None of these abort a turn. Each one is absorbed by the stage that hits it
//! and replaced with a deterministic alternative; the value is kept so the
//! caller can log why the alternative was used.

use llm_client::LlmClientError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The language-model call failed (transport, backend or timeout)
    #[error("Language model unavailable: {0}")]
    ModelUnavailable(#[from] LlmClientError),

    /// The extraction reply held no usable structured query
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// The refinement reply was empty or echoed data instead of prose
    #[error("Refinement invalid: {0}")]
    RefinementInvalid(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
