//! # Recommendation Orchestrator
//!
//! Sequences the stages of one turn:
//! 1. Extract a structured query from the new message
//! 2. Stop here if it isn't a recommendation request
//! 3. Retrieve candidates for the query
//! 4. Refine the candidates into the assistant reply
//!
//! ## State machine
//! `Idle -> ExtractingQuery -> (NonRecommendation | Retrieving -> Refining) -> Idle`,
//! with `Error -> Idle` reachable from every state. Every transition is
//! logged at debug and recorded in a `TurnTrace`.
//!
//! Each stage runs under `stage_timeout` and has its panics caught; both
//! become a `TurnError`. The orchestrator never touches the transcript it
//! is given: committing the turn is the session's job.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use domain::{Candidate, Message, SearchSettings, Transcript};
use llm_client::LanguageModel;
use pipeline::{Extraction, QueryExtractor, RefinementSource, ResponseRefiner};
use retrieval::{CandidateRetriever, SearchBackend};

/// Default deadline for each stage of a turn
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables for a turn
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Forwarded verbatim to the search backend
    pub search: SearchSettings,
    /// Deadline applied to each stage separately
    pub stage_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_search(mut self, search: SearchSettings) -> Self {
        self.search = search;
        self
    }

    pub fn with_stage_timeout(mut self, stage_timeout: Duration) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }
}

/// Where a turn is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    ExtractingQuery,
    NonRecommendation,
    Retrieving,
    Refining,
    Error,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::Idle => "idle",
            TurnState::ExtractingQuery => "extracting query",
            TurnState::NonRecommendation => "non-recommendation",
            TurnState::Retrieving => "retrieving",
            TurnState::Refining => "refining",
            TurnState::Error => "error",
        };
        f.write_str(name)
    }
}

/// The three outbound stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Retrieve,
    Refine,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Retrieve => "retrieve",
            Stage::Refine => "refine",
        };
        f.write_str(name)
    }
}

/// Failures that reach the turn boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TurnError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("The {stage} stage timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("The {stage} stage panicked: {message}")]
    Panicked { stage: Stage, message: String },
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Candidates were retrieved (possibly none) and a reply was built
    Recommended {
        candidates: Vec<Candidate>,
        /// The reply came from the local ranker, not the model
        fallback_used: bool,
    },
    /// The message wasn't a recommendation request
    NotRecommendation,
    /// A `TurnError` reached the boundary; nothing was committed
    Failed,
}

/// A turn that produced a reply to commit
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    pub outcome: TurnOutcome,
    pub reply: String,
}

/// States visited by one turn, in order
#[derive(Debug, Clone, PartialEq)]
pub struct TurnTrace {
    states: Vec<TurnState>,
}

impl Default for TurnTrace {
    fn default() -> Self {
        Self {
            states: vec![TurnState::Idle],
        }
    }
}

impl TurnTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, next: TurnState) {
        debug!("Turn state: {} -> {}", self.current(), next);
        self.states.push(next);
    }

    pub fn current(&self) -> TurnState {
        self.states.last().copied().unwrap_or_default()
    }

    pub fn states(&self) -> &[TurnState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<TurnState> {
        self.states
    }
}

/// Runs the turn state machine over the pipeline stages
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    extractor: QueryExtractor,
    retriever: CandidateRetriever,
    refiner: ResponseRefiner,
    config: OrchestratorConfig,
}

impl RecommendationOrchestrator {
    /// Create an orchestrator with all stages wired to the given backends
    ///
    /// # Arguments
    /// * `model` - Language model shared by extraction and refinement
    /// * `backend` - Search backend used for retrieval
    /// * `config` - Search settings and stage timeout
    pub fn new(
        model: Arc<dyn LanguageModel>,
        backend: Arc<dyn SearchBackend>,
        config: OrchestratorConfig,
    ) -> Self {
        info!(
            "Orchestrator using {} model, limit {}, stage timeout {:?}",
            model.provider().label(),
            config.search.limit,
            config.stage_timeout
        );
        Self {
            extractor: QueryExtractor::new(model.clone()),
            retriever: CandidateRetriever::new(backend),
            refiner: ResponseRefiner::new(model),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one turn for `message` against `transcript`.
    ///
    /// The trace always ends in `Idle`. On `Err` it passes through `Error`
    /// first.
    #[instrument(skip(self, transcript, message, trace))]
    pub async fn run_turn(
        &self,
        transcript: &Transcript,
        message: &str,
        today: NaiveDate,
        trace: &mut TurnTrace,
    ) -> Result<CompletedTurn, TurnError> {
        let result = self.advance(transcript, message, today, trace).await;
        if let Err(e) = &result {
            error!("Turn failed in state {}: {}", trace.current(), e);
            trace.enter(TurnState::Error);
        }
        trace.enter(TurnState::Idle);
        result
    }

    async fn advance(
        &self,
        transcript: &Transcript,
        message: &str,
        today: NaiveDate,
        trace: &mut TurnTrace,
    ) -> Result<CompletedTurn, TurnError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        trace.enter(TurnState::ExtractingQuery);
        let extraction = self
            .guarded(Stage::Extract, self.extractor.extract(transcript, message, today))
            .await?;

        let query = match extraction {
            Extraction::Query(query) => query,
            Extraction::NotRecommendation { reply, cause } => {
                info!("Not a recommendation request: {}", cause);
                trace.enter(TurnState::NonRecommendation);
                return Ok(CompletedTurn {
                    outcome: TurnOutcome::NotRecommendation,
                    reply,
                });
            }
        };

        trace.enter(TurnState::Retrieving);
        let search = &self.config.search;
        let retrieval = self
            .guarded(
                Stage::Retrieve,
                self.retriever.retrieve(&query, search.limit, &search.tuning),
            )
            .await?;
        if let Some(e) = &retrieval.error {
            warn!("Continuing without candidates: {}", e);
        }

        trace.enter(TurnState::Refining);
        let mut asked = transcript.clone();
        asked.push(Message::user(message));
        let refinement = self
            .guarded(Stage::Refine, self.refiner.refine(&asked, &retrieval.candidates))
            .await?;
        if let RefinementSource::Fallback(cause) = &refinement.source {
            debug!("Refinement fell back to local ranking: {}", cause);
        }

        Ok(CompletedTurn {
            outcome: TurnOutcome::Recommended {
                fallback_used: refinement.used_fallback(),
                candidates: retrieval.candidates,
            },
            reply: refinement.text,
        })
    }

    /// Run a stage under the deadline, turning panics into errors
    async fn guarded<F, T>(&self, stage: Stage, stage_future: F) -> Result<T, TurnError>
    where
        F: Future<Output = T>,
    {
        let after = self.config.stage_timeout;
        match tokio::time::timeout(after, AssertUnwindSafe(stage_future).catch_unwind()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(panic)) => Err(TurnError::Panicked {
                stage,
                message: panic_message(panic.as_ref()),
            }),
            Err(_) => Err(TurnError::Timeout { stage, after }),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{nineties_sci_fi, text, RecordingBackend, Reply, ScriptedModel, SCI_FI_QUERY};
    use domain::SearchTuning;
    use TurnState::{Error, ExtractingQuery, Idle, NonRecommendation, Refining, Retrieving};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn orchestrator(
        model: Arc<ScriptedModel>,
        backend: Arc<RecordingBackend>,
    ) -> RecommendationOrchestrator {
        RecommendationOrchestrator::new(model, backend, OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn test_recommendation_path() {
        let model = Arc::new(ScriptedModel::new(vec![
            text(SCI_FI_QUERY),
            text("1. **The Matrix** - the defining 90s sci-fi film."),
        ]));
        let backend = Arc::new(RecordingBackend::returning(nineties_sci_fi()));
        let mut trace = TurnTrace::new();

        let turn = orchestrator(model.clone(), backend.clone())
            .run_turn(&Transcript::with_greeting(), "suggest a sci-fi movie from the 90s", today(), &mut trace)
            .await
            .unwrap();

        assert_eq!(turn.reply, "1. **The Matrix** - the defining 90s sci-fi film.");
        assert!(matches!(
            turn.outcome,
            TurnOutcome::Recommended { fallback_used: false, ref candidates } if candidates.len() == 3
        ));
        assert_eq!(trace.states(), &[Idle, ExtractingQuery, Retrieving, Refining, Idle]);

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].limit, 10);
        assert_eq!(requests[0].tuning, SearchTuning::default());
        assert_eq!(requests[0].query.row_checker.min_year, Some(1990));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_non_recommendation_skips_retrieval() {
        let model = Arc::new(ScriptedModel::new(vec![text("Please ask me about movies!")]));
        let backend = Arc::new(RecordingBackend::returning(nineties_sci_fi()));
        let mut trace = TurnTrace::new();

        let turn = orchestrator(model.clone(), backend.clone())
            .run_turn(&Transcript::with_greeting(), "what's the weather?", today(), &mut trace)
            .await
            .unwrap();

        assert_eq!(turn.outcome, TurnOutcome::NotRecommendation);
        assert_eq!(turn.reply, "Please ask me about movies!");
        assert_eq!(trace.states(), &[Idle, ExtractingQuery, NonRecommendation, Idle]);
        assert!(backend.requests().is_empty());
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_positive_query_never_retrieves() {
        for reply in [
            "```json\n{\"positive_query\": \"\", \"row_checker\": {}}\n```",
            "```json\n{\"negative_query\": \"horror\"}\n```",
            "{\"positive_query\": null}",
        ] {
            let model = Arc::new(ScriptedModel::new(vec![text(reply)]));
            let backend = Arc::new(RecordingBackend::returning(nineties_sci_fi()));

            let turn = orchestrator(model, backend.clone())
                .run_turn(&Transcript::new(), "hmm", today(), &mut TurnTrace::new())
                .await
                .unwrap();

            assert_eq!(turn.outcome, TurnOutcome::NotRecommendation, "reply: {}", reply);
            assert!(backend.requests().is_empty(), "reply: {}", reply);
        }
    }

    #[tokio::test]
    async fn test_search_failure_still_replies() {
        let model = Arc::new(ScriptedModel::new(vec![text(SCI_FI_QUERY), text("unused")]));
        let backend = Arc::new(RecordingBackend::failing());
        let mut trace = TurnTrace::new();

        let turn = orchestrator(model.clone(), backend)
            .run_turn(&Transcript::with_greeting(), "90s sci-fi", today(), &mut trace)
            .await
            .unwrap();

        assert_eq!(turn.reply, pipeline::NO_MATCHES_MESSAGE);
        assert_eq!(
            turn.outcome,
            TurnOutcome::Recommended {
                candidates: Vec::new(),
                fallback_used: true
            }
        );
        assert_eq!(trace.current(), Idle);
        assert!(!trace.states().contains(&Error));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_stage_times_out() {
        let model = Arc::new(ScriptedModel::new(vec![Reply::Hang]));
        let backend = Arc::new(RecordingBackend::returning(nineties_sci_fi()));
        let config = OrchestratorConfig::default().with_stage_timeout(Duration::from_secs(5));
        let mut trace = TurnTrace::new();

        let err = RecommendationOrchestrator::new(model, backend, config)
            .run_turn(&Transcript::new(), "anything", today(), &mut trace)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TurnError::Timeout {
                stage: Stage::Extract,
                after: Duration::from_secs(5)
            }
        );
        assert_eq!(trace.states(), &[Idle, ExtractingQuery, Error, Idle]);
    }

    #[tokio::test]
    async fn test_panicking_stage_is_caught() {
        let model = Arc::new(ScriptedModel::new(vec![text(SCI_FI_QUERY), Reply::Panic]));
        let backend = Arc::new(RecordingBackend::returning(nineties_sci_fi()));
        let mut trace = TurnTrace::new();

        let err = orchestrator(model, backend)
            .run_turn(&Transcript::new(), "90s sci-fi", today(), &mut trace)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TurnError::Panicked {
                stage: Stage::Refine,
                message: "model exploded".to_string()
            }
        );
        assert_eq!(trace.states(), &[Idle, ExtractingQuery, Retrieving, Refining, Error, Idle]);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let backend = Arc::new(RecordingBackend::returning(Vec::new()));
        let mut trace = TurnTrace::new();

        let err = orchestrator(model.clone(), backend)
            .run_turn(&Transcript::new(), "   ", today(), &mut trace)
            .await
            .unwrap_err();

        assert_eq!(err, TurnError::EmptyMessage);
        assert_eq!(trace.states(), &[Idle, Error, Idle]);
        assert_eq!(model.call_count(), 0);
    }
}
