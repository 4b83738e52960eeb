//! Local Ranker - deterministic fallback when the model can't be used
//!
//! ## Order
//! 1. `score` descending; missing (or non-finite) scores last
//! 2. `rating` descending; missing ratings last
//! 3. `title` ascending
//!
//! The sort is stable, so fully tied candidates keep their input order and
//! the same input always produces the same text.

use std::cmp::Ordering;

use domain::Candidate;
use tracing::debug;

/// Number of picks when the caller doesn't say
pub const DEFAULT_PICKS: usize = 3;

/// Descriptions longer than this many words are cut and marked with `...`
pub const DESCRIPTION_WORD_LIMIT: usize = 40;

/// Returned instead of an empty list when there is nothing to rank
pub const NO_MATCHES_MESSAGE: &str = "Sorry, I couldn't find any movies matching your request. \
     Try loosening your filters or describing what you'd like to watch in a different way.";

const HEADER: &str = "Here are the best matches I found:";

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRanker;

impl LocalRanker {
    pub fn new() -> Self {
        Self
    }

    /// Format the top `n` candidates as a Markdown list.
    ///
    /// Never returns an empty string: no candidates gives
    /// [`NO_MATCHES_MESSAGE`]. `n == 0` is treated as one pick.
    pub fn rank(&self, candidates: &[Candidate], n: usize) -> String {
        if candidates.is_empty() {
            return NO_MATCHES_MESSAGE.to_string();
        }

        let mut ordered: Vec<&Candidate> = candidates.iter().collect();
        ordered.sort_by(|a, b| compare_candidates(a, b));

        let picks: Vec<String> = ordered
            .into_iter()
            .take(n.max(1))
            .enumerate()
            .map(|(i, candidate)| format_entry(i + 1, candidate))
            .collect();
        debug!("Locally ranked {} of {} candidates", picks.len(), candidates.len());

        format!("{}\n\n{}", HEADER, picks.join("\n\n"))
    }
}

/// The ranking order as a comparator
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    descending_present_first(finite(a.score), finite(b.score))
        .then_with(|| descending_present_first(finite(a.rating), finite(b.rating)))
        .then_with(|| a.title.cmp(&b.title))
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn descending_present_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn format_entry(position: usize, candidate: &Candidate) -> String {
    let mut headline = format!("{}. **{}**", position, candidate.title.trim());
    if let Some(year) = candidate.year {
        headline.push_str(&format!(" ({})", year));
    }
    if let Some(link) = candidate.reference_link() {
        headline.push_str(&format!(" - [IMDb]({})", link));
    }

    let mut lines = vec![headline];
    if let Some(rating) = finite(candidate.rating) {
        lines.push(format!("   Rating: {:.1}", rating));
    }

    let mut summary = Vec::new();
    if !candidate.genres.is_empty() {
        summary.push(format!("Genres: {}", candidate.genres.join(", ")));
    }
    if !candidate.languages.is_empty() {
        summary.push(format!("Languages: {}", candidate.languages.join(", ")));
    }
    if !summary.is_empty() {
        lines.push(format!("   {}", summary.join(" | ")));
    }

    let description = truncate_words(&candidate.description, DESCRIPTION_WORD_LIMIT);
    if !description.is_empty() {
        lines.push(format!("   {}", description));
    }

    lines.join("\n")
}

/// First `limit` words, with `...` appended when anything was cut
pub fn truncate_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > limit {
        format!("{}...", words[..limit].join(" "))
    } else {
        words.join(" ")
    }
}
