//! Error types for the domain crate.
//!
//! These cover the few operations on domain values that can fail on their
//! own: validating search settings, parsing an embedding model selector and
//! addressing a saved session that doesn't exist.

use thiserror::Error;

/// Errors raised while building or addressing domain values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A search setting fell outside the range the backend accepts
    #[error("Invalid value for {field}: {value} (expected {expected})")]
    InvalidSetting {
        field: String,
        value: String,
        expected: String,
    },

    /// The embedding model selector matched none of the known models
    #[error("Unknown embedding model: {0}")]
    UnknownEmbeddingModel(String),

    /// A saved session index is out of range
    #[error("Session {index} not found ({count} saved sessions)")]
    SessionNotFound { index: usize, count: usize },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DomainError>;
