//! Query Extractor - free text to `StructuredQuery`
//!
//! ## Algorithm
//! 1. Frame the call: `transcript + [system instruction, user message]`.
//!    The instruction carries today's date and is never stored.
//! 2. Ask the language model once (no retry).
//! 3. Look for a ```` ```json ```` block in the reply, then for any fenced
//!    block; without either the whole reply is offered to the parser.
//! 4. Strip trailing commas and decode leniently.
//! 5. Accept only a query with a non-blank `positive_query`. Anything else
//!    is "not a recommendation request" and the reply text goes back to the
//!    user as-is.

use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, instrument, warn};

use domain::{Message, StructuredQuery, Transcript};
use llm_client::LanguageModel;

use crate::error::{PipelineError, Result};

/// Reply used when the model gave nothing usable to show
pub const REPHRASE_MESSAGE: &str =
    "Sorry, I couldn't understand your request. Can you rephrase it as a movie recommendation?";

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```json\s*([\s\S]*?)\s*```").expect("Invalid JSON fence regex"));

static PLAIN_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*([\s\S]*?)\s*```").expect("Invalid fence regex"));

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("Invalid trailing comma regex"));

/// What the extractor made of the newest user message
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// An actionable query; continue to retrieval
    Query(StructuredQuery),
    /// Not a recommendation request. `reply` is what the user should see.
    NotRecommendation { reply: String, cause: PipelineError },
}

impl Extraction {
    pub fn is_query(&self) -> bool {
        matches!(self, Extraction::Query(_))
    }
}

/// Turns the dialogue plus the newest message into a structured search query
#[derive(Clone)]
pub struct QueryExtractor {
    model: Arc<dyn LanguageModel>,
}

impl QueryExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Extract a query for `new_message`.
    ///
    /// `transcript` is the dialogue before the new message; it is read, never
    /// modified. A failed model call is absorbed into `NotRecommendation`
    /// with the rephrase message as the reply.
    #[instrument(skip(self, transcript, new_message), fields(history = transcript.len()))]
    pub async fn extract(&self, transcript: &Transcript, new_message: &str, today: NaiveDate) -> Extraction {
        let messages = transcript.framed(
            &[],
            &[
                Message::system(extraction_instruction(today)),
                Message::user(new_message),
            ],
        );

        let raw = match self.model.complete(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Extraction call failed: {}", e);
                return Extraction::NotRecommendation {
                    reply: REPHRASE_MESSAGE.to_string(),
                    cause: e.into(),
                };
            }
        };
        debug!("Extraction reply: {}", raw);

        match parse_structured_query(&raw) {
            Ok(query) => {
                debug!(
                    "Extracted query '{}' (negative '{}')",
                    query.positive_query, query.negative_query
                );
                Extraction::Query(query)
            }
            Err(cause) => {
                debug!("Not a recommendation request: {}", cause);
                Extraction::NotRecommendation {
                    reply: reply_text(&raw),
                    cause,
                }
            }
        }
    }
}

/// The one-shot system message sent with every extraction call
pub fn extraction_instruction(today: NaiveDate) -> String {
    format!(
        "Today's date is {}.\n\
         If the user asks something other than movies promptly ask the user to rephrase the question and ask for movie recommendations.\n\
         You are an assistant that takes a movie-related user prompt and extracts:\n\
         1. A positive_query: A string with words related to what the user wants: actors, places, themes, plots etc. (do not mention any actual movie and do not leave empty).\n\
         2. A negative_query: A string describing actors or themes the user wants to avoid.\n\
         3. A row_checker object that may include any of the following optional filters (do not put too many restrictions, only what the user asked for):\n\
         \x20  - min_year (integer)\n\
         \x20  - max_year (integer)\n\
         \x20  - min_rating (float)\n\
         \x20  - max_rating (float)\n\
         \x20  - min_duration (integer, in minutes)\n\
         \x20  - max_duration (integer, in minutes)\n\
         \x20  - required_genres (list of strings)\n\
         \x20  - excluded_genres (list of strings)\n\
         \x20  - required_languages (list of strings)\n\
         \x20  - excluded_languages (list of strings)\n\
         If the prompt is asking for movie recommendation return ONLY a valid JSON object with keys: positive_query, negative_query, row_checker.\n",
        today.format("%A, %B %-d, %Y")
    )
}

/// Decode a model reply into an actionable query.
///
/// A `json`-tagged fence wins over untagged ones, which may hold the model's
/// notes. Without any fence the whole reply is parsed.
pub fn parse_structured_query(raw: &str) -> Result<StructuredQuery> {
    let block = [&*JSON_FENCE, &*PLAIN_FENCE]
        .into_iter()
        .find_map(|fence| fence.captures(raw).and_then(|caps| caps.get(1)))
        .map_or(raw, |m| m.as_str());
    let cleaned = strip_trailing_commas(block);

    let query: StructuredQuery = serde_json::from_str(&cleaned)
        .map_err(|e| PipelineError::MalformedQuery(format!("not a JSON query: {}", e)))?;

    if !query.is_actionable() {
        return Err(PipelineError::MalformedQuery("empty positive_query".to_string()));
    }
    Ok(query)
}

/// `{"a": 1,}` -> `{"a": 1}`, `[1, 2, ]` -> `[1, 2]`
pub fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").trim().to_string()
}

fn reply_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        REPHRASE_MESSAGE.to_string()
    } else {
        trimmed.to_string()
    }
}
