//! Search backend seam and its HTTP implementation.
//!
//! The canonical request is the predicate-tree search:
//! `POST {base}/search` with `{query, negative_query, filters, limit, ...tuning}`.
//!
//! The legacy parameter-tuple vector search
//! (`POST {base}/advanced-query-search` with `top_k` and a raw `row_checker`)
//! is a deprecated configuration variant of the same client: one request
//! builder and one response decoder serve both.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use domain::{Candidate, SearchTuning, StructuredQuery};

use crate::predicate::FilterTree;

/// Errors that can occur when calling the search backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    #[error("Search call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Search backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Invalid response from search backend: {0}")]
    InvalidResponse(String),
}

/// Everything one search call needs
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: StructuredQuery,
    /// Maximum number of results, always positive
    pub limit: u32,
    pub tuning: SearchTuning,
}

/// Which request shape to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchEndpoint {
    /// Predicate-tree search
    #[default]
    Canonical,
    /// Deprecated parameter-tuple vector search
    Legacy,
}

impl SearchEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            SearchEndpoint::Canonical => "/search",
            SearchEndpoint::Legacy => "/advanced-query-search",
        }
    }
}

/// Core trait for search backends.
///
/// Implementations return the backend's candidates in backend order, or a
/// `SearchError`. Absorbing the error is the retriever's job.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError>;
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the search backend
#[derive(Debug, Clone)]
pub struct HttpSearchBackend {
    client: Client,
    base_url: String,
    endpoint: SearchEndpoint,
    timeout: Option<Duration>,
}

impl HttpSearchBackend {
    /// Create a client for the canonical endpoint.
    ///
    /// # Arguments
    /// * `base_url` - Backend address (e.g., "http://localhost:5000")
    pub fn new(base_url: impl Into<String>) -> Result<Self, SearchError> {
        Self::build(base_url.into(), SearchEndpoint::Canonical, None)
    }

    /// Switch to another request shape (builder pattern)
    pub fn with_endpoint(mut self, endpoint: SearchEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Create a client whose requests fail with `Timeout` after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        Self::build(base_url.into(), SearchEndpoint::Canonical, Some(timeout))
    }

    fn build(
        base_url: String,
        endpoint: SearchEndpoint,
        timeout: Option<Duration>,
    ) -> Result<Self, SearchError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Search client for {}", base_url);

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SearchError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> SearchEndpoint {
        self.endpoint
    }

    /// JSON body for the configured request shape
    pub fn request_body(&self, request: &SearchRequest) -> Value {
        let query = &request.query;
        let tuning = &request.tuning;
        let negative_query = if query.negative_query.trim().is_empty() {
            Value::Null
        } else {
            Value::from(query.negative_query.clone())
        };

        match self.endpoint {
            SearchEndpoint::Canonical => json!({
                "query": query.positive_query,
                "negative_query": negative_query,
                "filters": FilterTree::from_filter(&query.row_checker).to_json(),
                "limit": request.limit,
                "search_batch_size": tuning.search_batch_size,
                "alpha": tuning.alpha,
                "beta": tuning.beta,
                "model_choice": tuning.embedding_model.code(),
            }),
            SearchEndpoint::Legacy => json!({
                "positive_query": query.positive_query,
                "negative_query": negative_query,
                "top_k": request.limit,
                "search_batch_size": tuning.search_batch_size,
                "row_checker": query.row_checker,
                "alpha": tuning.alpha,
                "beta": tuning.beta,
                "model_choice": tuning.embedding_model.code(),
            }),
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> SearchError {
        if e.is_timeout() {
            SearchError::Timeout(self.timeout.unwrap_or_default())
        } else {
            SearchError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>, SearchError> {
        let url = format!("{}{}", self.base_url, self.endpoint.path());
        let body = self.request_body(request);
        debug!("Searching {} for '{}' (limit {})", url, request.query.positive_query, request.limit);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Search call to {} failed: {}", url, e);
                self.map_transport_error(e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_transport_error(e))?;
        let parsed = serde_json::from_str::<SearchResponse>(&text);

        if !status.is_success() {
            let message = parsed.ok().and_then(|r| r.error).unwrap_or(text);
            error!("Search backend returned {}: {}", status, message);
            return Err(SearchError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = parsed.map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        let raw = parsed.results.unwrap_or_default();

        if raw.is_empty() {
            if let Some(message) = parsed.error {
                warn!("Search backend reported an error with no results: {}", message);
                return Err(SearchError::Backend {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        let candidates = decode_results(raw);
        debug!("Search returned {} candidates", candidates.len());
        Ok(candidates)
    }
}

/// Decode backend results into candidates.
///
/// Accepts flat movie records and the vector-search shape
/// `{id, score, metadata: {...}}`, where top-level `id`/`score` win over the
/// metadata's. One level of nested arrays (per-query result lists) is
/// flattened. Records that don't decode are skipped.
pub fn decode_results(raw: Vec<Value>) -> Vec<Candidate> {
    raw.into_iter()
        .flat_map(|value| match value {
            Value::Array(inner) => inner,
            other => vec![other],
        })
        .filter_map(decode_record)
        .collect()
}

fn decode_record(value: Value) -> Option<Candidate> {
    let Value::Object(mut record) = value else {
        return None;
    };

    let record = match record.remove("metadata") {
        Some(Value::Object(mut metadata)) => {
            for key in ["id", "score"] {
                if let Some(v) = record.remove(key).filter(|v| !v.is_null()) {
                    metadata.insert(key.to_string(), v);
                }
            }
            metadata
        }
        Some(other) => {
            record.insert("metadata".to_string(), other);
            record
        }
        None => record,
    };

    match serde_json::from_value::<Candidate>(Value::Object(record)) {
        Ok(candidate) if candidate.title.trim().is_empty() => {
            warn!("Skipping search result without a title");
            None
        }
        Ok(candidate) => Some(candidate),
        Err(e) => {
            warn!("Skipping undecodable search result: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{AttributeFilter, EmbeddingModel};

    fn sample_request() -> SearchRequest {
        SearchRequest {
            query: StructuredQuery::new("sci-fi movie")
                .with_negative("horror")
                .with_filter(AttributeFilter {
                    min_year: Some(1990),
                    max_year: Some(1999),
                    ..AttributeFilter::default()
                }),
            limit: 7,
            tuning: SearchTuning {
                search_batch_size: 150,
                alpha: 0.8,
                beta: 0.25,
                embedding_model: EmbeddingModel::AllMiniLmL12V2,
            },
        }
    }

    #[test]
    fn test_canonical_body() {
        let backend = HttpSearchBackend::new("http://localhost:5000").unwrap();
        let body = backend.request_body(&sample_request());

        assert_eq!(
            body,
            json!({
                "query": "sci-fi movie",
                "negative_query": "horror",
                "filters": { "$and": [ { "year": { "$gte": 1990, "$lte": 1999 } } ] },
                "limit": 7,
                "search_batch_size": 150,
                "alpha": 0.8,
                "beta": 0.25,
                "model_choice": "5",
            })
        );
    }

    #[test]
    fn test_legacy_body_passes_row_checker_through() {
        let backend = HttpSearchBackend::new("http://localhost:5000")
            .unwrap()
            .with_endpoint(SearchEndpoint::Legacy);
        let mut request = sample_request();
        request.query.negative_query = String::new();

        let body = backend.request_body(&request);

        assert_eq!(body["positive_query"], "sci-fi movie");
        assert_eq!(body["negative_query"], Value::Null);
        assert_eq!(body["top_k"], 7);
        assert_eq!(body["row_checker"], json!({ "min_year": 1990, "max_year": 1999 }));
        assert!(body.get("filters").is_none());
    }

    #[test]
    fn test_decode_flat_and_nested_records() {
        let raw = vec![
            json!({ "title": "Gattaca", "year": 1997, "genres": ["Sci-Fi"], "score": 0.91 }),
            json!({
                "id": "tt0133093",
                "score": 0.88,
                "positive_similarity": 0.9,
                "metadata": { "id": "ignored", "title": "The Matrix", "year": "1999",
                              "rating": null, "genres": "['Action', 'Sci-Fi']" }
            }),
            json!("not a record"),
        ];

        let candidates = decode_results(raw);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Gattaca");
        assert_eq!(candidates[0].id, None);
        assert_eq!(candidates[1].id.as_deref(), Some("tt0133093"));
        assert_eq!(candidates[1].score, Some(0.88));
        assert_eq!(candidates[1].year, Some(1999));
        assert_eq!(candidates[1].rating, None);
        assert_eq!(candidates[1].genres, vec!["Action", "Sci-Fi"]);
    }

    #[test]
    fn test_decode_flattens_per_query_lists() {
        let raw = vec![json!([{ "title": "Alien" }, { "title": "Aliens" }])];
        let titles: Vec<String> = decode_results(raw).into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["Alien", "Aliens"]);
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(SearchEndpoint::default(), SearchEndpoint::Canonical);
        assert_eq!(SearchEndpoint::Canonical.path(), "/search");
        assert_eq!(SearchEndpoint::Legacy.path(), "/advanced-query-search");
    }
}
