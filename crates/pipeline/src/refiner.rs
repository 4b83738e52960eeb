//! Response Refiner - second model call that picks and justifies the final titles
//!
//! The model sees `[instruction] + transcript + [candidates as JSON]`.
//! Its reply is used only if it passes [`needs_fallback`]; otherwise, and
//! whenever the call fails, the `LocalRanker` output is used instead.
//! With no candidates the model is not called at all.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use domain::{Candidate, Message, Transcript};
use llm_client::LanguageModel;

use crate::error::PipelineError;
use crate::ranker::{LocalRanker, DEFAULT_PICKS};

const REFINE_INSTRUCTION: &str = "You are a movie assistant. Based on the user's original prompt, \
     evaluate the following list of movie candidates and suggest the most suitable ones ranked by relevance.\n\
     Respond with a list of up to 3 recommended titles, with short justification for each, \
     generate the response utilizing markdown, insert links for imdb from meta data.";

/// Where the refined text came from
#[derive(Debug, Clone, PartialEq)]
pub enum RefinementSource {
    /// The model's prose was accepted
    Model,
    /// Nothing was retrieved; the ranker's apology was used
    NoCandidates,
    /// The model reply was rejected or the call failed
    Fallback(PipelineError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub text: String,
    pub source: RefinementSource,
}

impl Refinement {
    /// True when the text came from the local ranker
    pub fn used_fallback(&self) -> bool {
        self.source != RefinementSource::Model
    }
}

/// Leading-character check for a reply that echoed data instead of prose.
///
/// Empty, `{...` and `[...` replies (after trimming) are rejected. Nothing
/// deeper is parsed.
pub fn needs_fallback(response: &str) -> bool {
    let trimmed = response.trim();
    trimmed.is_empty() || trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Builds the final recommendation text
#[derive(Clone)]
pub struct ResponseRefiner {
    model: Arc<dyn LanguageModel>,
    ranker: LocalRanker,
}

impl ResponseRefiner {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            ranker: LocalRanker::new(),
        }
    }

    /// Pick up to three titles from `candidates`.
    ///
    /// `transcript` must already end with the user message being answered.
    #[instrument(skip(self, transcript, candidates), fields(candidates = candidates.len()))]
    pub async fn refine(&self, transcript: &Transcript, candidates: &[Candidate]) -> Refinement {
        if candidates.is_empty() {
            info!("No candidates to refine");
            return Refinement {
                text: self.ranker.rank(candidates, DEFAULT_PICKS),
                source: RefinementSource::NoCandidates,
            };
        }

        let candidates_json = match serde_json::to_string(candidates) {
            Ok(json) => json,
            Err(e) => {
                return self.fallback(candidates, PipelineError::RefinementInvalid(format!(
                    "could not serialise candidates: {}",
                    e
                )));
            }
        };

        let messages = transcript.framed(
            &[Message::system(REFINE_INSTRUCTION)],
            &[Message::system(format!(
                "Here are the candidate movies: {}\nSuggest 3 movies from the list, with detailed information \
                 to the end user based on the above query.",
                candidates_json
            ))],
        );

        match self.model.complete(&messages).await {
            Ok(response) if needs_fallback(&response) => {
                let preview: String = response.trim().chars().take(40).collect();
                self.fallback(
                    candidates,
                    PipelineError::RefinementInvalid(format!("unusable reply '{}'", preview)),
                )
            }
            Ok(response) => {
                debug!("Refined reply accepted ({} characters)", response.len());
                Refinement {
                    text: response.trim().to_string(),
                    source: RefinementSource::Model,
                }
            }
            Err(e) => self.fallback(candidates, e.into()),
        }
    }

    fn fallback(&self, candidates: &[Candidate], cause: PipelineError) -> Refinement {
        warn!("Falling back to local ranking: {}", cause);
        Refinement {
            text: self.ranker.rank(candidates, DEFAULT_PICKS),
            source: RefinementSource::Fallback(cause),
        }
    }
}
