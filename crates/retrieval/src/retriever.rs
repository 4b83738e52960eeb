//! Candidate Retriever - structured query in, ranked movie records out
//!
//! Wraps a `SearchBackend` and guarantees the pipeline never sees a search
//! failure: backend errors, timeouts and malformed responses all degrade to
//! an empty candidate list, with the cause kept for logging.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use domain::{Candidate, SearchTuning, StructuredQuery};

use crate::backend::{SearchBackend, SearchError, SearchRequest};

/// Outcome of one retrieval: the candidates plus the absorbed error, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub candidates: Vec<Candidate>,
    /// Why `candidates` is empty when the backend failed
    pub error: Option<SearchError>,
}

impl Retrieval {
    pub fn found(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            error: None,
        }
    }

    pub fn failed(error: SearchError) -> Self {
        Self {
            candidates: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Fetches candidate movies for a structured query
#[derive(Clone)]
pub struct CandidateRetriever {
    /// Shared so the retriever can be cloned into each session
    backend: Arc<dyn SearchBackend>,
}

impl CandidateRetriever {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Retrieve at most `limit` candidates in backend order.
    ///
    /// Never fails. A zero `limit` is treated as one, since the backend
    /// requires a positive count.
    #[instrument(skip(self, query, tuning), fields(query = %query.positive_query))]
    pub async fn retrieve(&self, query: &StructuredQuery, limit: u32, tuning: &SearchTuning) -> Retrieval {
        let limit = limit.max(1);
        let request = SearchRequest {
            query: query.clone(),
            limit,
            tuning: tuning.clone(),
        };

        match self.backend.search(&request).await {
            Ok(mut candidates) => {
                if candidates.len() > limit as usize {
                    debug!("Backend returned {} candidates, keeping {}", candidates.len(), limit);
                    candidates.truncate(limit as usize);
                }
                info!("Retrieved {} candidates", candidates.len());
                Retrieval::found(candidates)
            }
            Err(e) => {
                warn!("Search failed, continuing with no candidates: {}", e);
                Retrieval::failed(e)
            }
        }
    }
}
