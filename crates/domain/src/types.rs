//! Core domain types for the recommendation conversation.
//!
//! This module defines the values that flow through a turn:
//! - Message and Transcript (the dialogue owned by a session)
//! - StructuredQuery and AttributeFilter (intent extracted from free text)
//! - Candidate (one movie record returned by the search backend)

use serde::{Deserialize, Serialize};

use crate::lenient;

/// First assistant message of every new transcript
pub const GREETING: &str = "Hello, What type of movie would you like to watch today?";

/// Base of the external reference link built from a candidate id
pub const IMDB_TITLE_URL: &str = "https://www.imdb.com/title/";

// =============================================================================
// Dialogue Types
// =============================================================================

/// Who authored a message. Serialised in lowercase, which is what the
/// language-model endpoints expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Ordered message history for one conversation.
///
/// Append-only: there is no way to remove or rewrite a message once it has
/// been pushed. Synthetic system framing for a single model call is built
/// next to the transcript (see [`Transcript::framed`]) and never stored in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Creates an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the default transcript every new session starts with
    pub fn with_greeting() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Content of the first user message, used to title saved sessions
    pub fn first_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Builds the message list for a one-shot model call:
    /// `before + transcript + after`. The transcript itself is untouched.
    pub fn framed(&self, before: &[Message], after: &[Message]) -> Vec<Message> {
        let mut framed = Vec::with_capacity(before.len() + self.messages.len() + after.len());
        framed.extend_from_slice(before);
        framed.extend_from_slice(&self.messages);
        framed.extend_from_slice(after);
        framed
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Optional numeric bounds and set constraints on movie attributes.
///
/// Every field is independently optional; empty lists mean "no constraint".
/// Decoding is lenient because the values are written by a language model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    #[serde(default, deserialize_with = "lenient::opt_integer", skip_serializing_if = "Option::is_none")]
    pub min_year: Option<i32>,
    #[serde(default, deserialize_with = "lenient::opt_integer", skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i32>,
    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<f64>,
    /// Minutes
    #[serde(default, deserialize_with = "lenient::opt_integer", skip_serializing_if = "Option::is_none")]
    pub min_duration: Option<i32>,
    #[serde(default, deserialize_with = "lenient::opt_integer", skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<i32>,

    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Vec::is_empty")]
    pub required_genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Vec::is_empty")]
    pub excluded_genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Vec::is_empty")]
    pub required_languages: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Vec::is_empty")]
    pub excluded_languages: Vec<String>,
}

impl AttributeFilter {
    /// True when no bound and no set constraint is present
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }
}

/// Machine-parseable intent extracted from free text.
///
/// A query whose `positive_query` is blank is not actionable; the pipeline
/// treats it as "not a recommendation request".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    #[serde(default, deserialize_with = "lenient::string")]
    pub positive_query: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub negative_query: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub row_checker: AttributeFilter,
}

impl StructuredQuery {
    pub fn new(positive_query: impl Into<String>) -> Self {
        Self {
            positive_query: positive_query.into(),
            ..Self::default()
        }
    }

    pub fn with_negative(mut self, negative_query: impl Into<String>) -> Self {
        self.negative_query = negative_query.into();
        self
    }

    pub fn with_filter(mut self, row_checker: AttributeFilter) -> Self {
        self.row_checker = row_checker;
        self
    }

    pub fn is_actionable(&self) -> bool {
        !self.positive_query.trim().is_empty()
    }
}

// =============================================================================
// Candidate Type
// =============================================================================

/// One retrieved movie record with an optional relevance score.
///
/// `title` and `description` default to empty strings; everything else is
/// optional because backends differ in which metadata they return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::opt_integer", skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Minutes
    #[serde(default, deserialize_with = "lenient::opt_integer", skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub languages: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::opt_number", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_genres<S: Into<String>>(mut self, genres: impl IntoIterator<Item = S>) -> Self {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_languages<S: Into<String>>(mut self, languages: impl IntoIterator<Item = S>) -> Self {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// IMDb title link, when the record carries a non-blank id
    pub fn reference_link(&self) -> Option<String> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}{}/", IMDB_TITLE_URL, id))
    }
}
