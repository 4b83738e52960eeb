//! In-memory collaborators for the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use domain::Candidate;
use retrieval::{SearchBackend, SearchError, SearchRequest};

pub use llm_client::testing::{text, Reply, ScriptedModel};

/// Returns a fixed answer and records every request
pub struct RecordingBackend {
    answer: Result<Vec<Candidate>, SearchError>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl RecordingBackend {
    pub fn returning(candidates: Vec<Candidate>) -> Self {
        Self {
            answer: Ok(candidates),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err(SearchError::Unavailable("connection refused".to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for RecordingBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.answer.clone()
    }
}

pub const SCI_FI_QUERY: &str = "```json\n{\"positive_query\": \"sci-fi movie\", \"negative_query\": \"\", \
     \"row_checker\": {\"min_year\": 1990, \"max_year\": 1999}}\n```";

pub fn nineties_sci_fi() -> Vec<Candidate> {
    vec![
        Candidate::new("tt0133093", "The Matrix").with_year(1999).with_score(0.9),
        Candidate::new("tt0119116", "The Fifth Element").with_year(1997).with_score(0.8),
        Candidate::new("tt0118884", "Contact").with_year(1997).with_score(0.7),
    ]
}
