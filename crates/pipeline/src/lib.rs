//! Language-model stages of a recommendation turn.
//!
//! This crate provides:
//! - `QueryExtractor`: free text to `StructuredQuery` via one model call
//! - `ResponseRefiner`: candidates to final prose via a second model call
//! - `LocalRanker`: the deterministic fallback used when the model reply
//!   can't be used
//!
//! ## Architecture
//! A turn runs the stages in sequence, each gated on the previous one:
//! 1. The extractor decides whether the message is a recommendation request
//! 2. The caller retrieves candidates for the query (see the `retrieval` crate)
//! 3. The refiner turns the candidates into the assistant reply
//!
//! No stage returns an error. Failures are absorbed into typed fallback
//! values that carry a `PipelineError` describing why.
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{Extraction, QueryExtractor, ResponseRefiner};
//!
//! let extractor = QueryExtractor::new(model.clone());
//! let refiner = ResponseRefiner::new(model);
//!
//! if let Extraction::Query(query) = extractor.extract(&transcript, message, today).await {
//!     let retrieval = retriever.retrieve(&query, 10, &tuning).await;
//!     let refinement = refiner.refine(&transcript_with_message, &retrieval.candidates).await;
//!     println!("{}", refinement.text);
//! }
//! ```

pub mod error;
pub mod extractor;
pub mod ranker;
pub mod refiner;

// Re-export main types
pub use error::PipelineError;
pub use extractor::{parse_structured_query, Extraction, QueryExtractor, REPHRASE_MESSAGE};
pub use ranker::{compare_candidates, LocalRanker, DEFAULT_PICKS, NO_MATCHES_MESSAGE};
pub use refiner::{needs_fallback, Refinement, RefinementSource, ResponseRefiner};
