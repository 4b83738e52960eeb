//! # Domain Crate
//!
//! Shared vocabulary of the recommendation conversation. Every other crate
//! in the workspace speaks in these types.
//!
//! ## Main Components
//!
//! - **types**: Message, Transcript, StructuredQuery, AttributeFilter, Candidate
//! - **settings**: SearchSettings, EmbeddingModel, ModelProvider
//! - **lenient**: tolerant serde decoders for model- and backend-written JSON
//! - **error**: Error types for the crate
//!
//! ## Example Usage
//!
//! ```ignore
//! use domain::{Message, StructuredQuery, Transcript};
//!
//! let mut transcript = Transcript::with_greeting();
//! transcript.push(Message::user("a slow-burn thriller"));
//!
//! let query: StructuredQuery = serde_json::from_str(r#"{"positive_query": "slow-burn thriller"}"#)?;
//! assert!(query.is_actionable());
//! ```

// Public modules
pub mod error;
pub mod lenient;
pub mod settings;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DomainError, Result};
pub use settings::{
    EmbeddingModel,
    ModelProvider,
    SearchSettings,
    SearchTuning,
    BATCH_SIZE_RANGE,
    DEFAULT_LOCAL_MODEL,
    LIMIT_RANGE,
    WEIGHT_RANGE,
};
pub use types::{
    AttributeFilter,
    Candidate,
    Message,
    Role,
    StructuredQuery,
    Transcript,
    GREETING,
};
