//! Integration tests for the pipeline.
//!
//! These tests run the extractor and the refiner against one shared model,
//! the way a turn uses them, and check the fallback paths end to end.

use std::sync::Arc;

use chrono::NaiveDate;
use domain::{Candidate, Message, Transcript};
use llm_client::testing::ScriptedModel;
use pipeline::{Extraction, LocalRanker, QueryExtractor, ResponseRefiner, DEFAULT_PICKS, NO_MATCHES_MESSAGE};

fn scripted(replies: &[&str]) -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel::script(replies))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn nineties_sci_fi() -> Vec<Candidate> {
    vec![
        Candidate::new("tt0119116", "The Fifth Element").with_year(1997).with_score(0.81).with_rating(7.6),
        Candidate::new("tt0133093", "The Matrix").with_year(1999).with_score(0.88).with_rating(8.7),
        Candidate::new("tt0118884", "Contact").with_year(1997).with_score(0.81).with_rating(7.5),
    ]
}

#[tokio::test]
async fn test_extract_then_refine_with_model_prose() {
    let model = scripted(&[
        "```json\n{\"positive_query\": \"sci-fi movie\", \"negative_query\": \"\", \"row_checker\": {\"min_year\": 1990, \"max_year\": 1999}}\n```",
        "1. **The Matrix** - a hacker discovers reality is simulated.",
    ]);
    let extractor = QueryExtractor::new(model.clone());
    let refiner = ResponseRefiner::new(model.clone());
    let mut transcript = Transcript::with_greeting();
    let message = "suggest a sci-fi movie from the 90s";

    let query = match extractor.extract(&transcript, message, today()).await {
        Extraction::Query(query) => query,
        other => panic!("expected a query, got {:?}", other),
    };
    assert_eq!(query.row_checker.min_year, Some(1990));
    assert_eq!(query.row_checker.max_year, Some(1999));

    transcript.push(Message::user(message));
    let refinement = refiner.refine(&transcript, &nineties_sci_fi()).await;

    assert!(!refinement.used_fallback());
    assert!(refinement.text.starts_with("1. **The Matrix**"));
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn test_refiner_echo_uses_local_ranking() {
    let model = scripted(&["[{\"title\": \"The Matrix\"}]"]);
    let refiner = ResponseRefiner::new(model);

    let refinement = refiner.refine(&Transcript::with_greeting(), &nineties_sci_fi()).await;

    assert!(refinement.used_fallback());
    let expected = LocalRanker::new().rank(&nineties_sci_fi(), DEFAULT_PICKS);
    assert_eq!(refinement.text, expected);

    // score ties broken by rating: Matrix, Fifth Element, Contact
    let matrix = expected.find("The Matrix").unwrap();
    let fifth = expected.find("The Fifth Element").unwrap();
    let contact = expected.find("Contact").unwrap();
    assert!(matrix < fifth && fifth < contact);
}

#[tokio::test]
async fn test_non_recommendation_stops_after_extraction() {
    let model = scripted(&["I'm a movie assistant. Could you ask me for a movie recommendation instead?"]);
    let extractor = QueryExtractor::new(model.clone());

    let extraction = extractor
        .extract(&Transcript::with_greeting(), "what's the weather?", today())
        .await;

    assert!(!extraction.is_query());
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_no_candidates_never_reaches_model() {
    let model = scripted(&["unused"]);
    let refiner = ResponseRefiner::new(model.clone());

    let refinement = refiner.refine(&Transcript::with_greeting(), &[]).await;

    assert_eq!(refinement.text, NO_MATCHES_MESSAGE);
    assert_eq!(model.call_count(), 0);
}
