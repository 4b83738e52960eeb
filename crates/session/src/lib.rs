//! Session crate for the cine-bot recommendation assistant.
//!
//! This crate contains the turn orchestrator that sequences the pipeline
//! stages, and the conversation session that owns the transcripts and
//! commits each turn.
//!
//! ## Example Usage
//! ```ignore
//! use session::{ConversationSession, OrchestratorConfig, RecommendationOrchestrator};
//! use std::sync::Arc;
//!
//! let orchestrator = RecommendationOrchestrator::new(model, backend, OrchestratorConfig::default());
//! let mut session = ConversationSession::new(orchestrator);
//!
//! let report = session.handle_message("suggest a sci-fi movie from the 90s").await;
//! println!("{}", report.reply);
//! ```

pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod testing;

pub use orchestrator::{
    CompletedTurn, OrchestratorConfig, RecommendationOrchestrator, Stage, TurnError, TurnOutcome, TurnState,
    TurnTrace, DEFAULT_STAGE_TIMEOUT,
};
pub use session::{ConversationSession, SessionSummary, TurnReport, TURN_FAILED_MESSAGE};
