//! # Retrieval Crate
//!
//! Turns a `StructuredQuery` into candidate movie records by calling the
//! search backend.
//!
//! ## Components
//!
//! ### Predicate translation (`predicate`)
//! Maps an `AttributeFilter` onto a conjunction of backend predicates:
//! inclusive ranges for year, rating and duration, "intersects" and
//! "disjoint" conditions for genre and language lists.
//!
//! ### Search backend (`backend`)
//! The `SearchBackend` trait and its HTTP implementation. The canonical
//! request carries the predicate tree; the deprecated legacy request carries
//! the raw filter as a parameter tuple.
//!
//! ### Retriever (`retriever`)
//! `CandidateRetriever` owns the failure policy: every backend failure
//! becomes an empty candidate list.
//!
//! ## Example Usage
//!
//! ```ignore
//! use retrieval::{CandidateRetriever, HttpSearchBackend};
//! use domain::{SearchTuning, StructuredQuery};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(HttpSearchBackend::new("http://localhost:5000")?);
//! let retriever = CandidateRetriever::new(backend);
//!
//! let retrieval = retriever
//!     .retrieve(&StructuredQuery::new("heist movie"), 10, &SearchTuning::default())
//!     .await;
//! println!("{} candidates", retrieval.candidates.len());
//! ```

pub mod backend;
pub mod predicate;
pub mod retriever;

pub use backend::{decode_results, HttpSearchBackend, SearchBackend, SearchEndpoint, SearchError, SearchRequest};
pub use predicate::{Field, FilterTree, Predicate};
pub use retriever::{CandidateRetriever, Retrieval};
