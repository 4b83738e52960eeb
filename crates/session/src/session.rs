//! Conversation Session - owns the transcripts and commits turns
//!
//! ## Ownership
//! The session is the only writer of its transcripts. A turn reads the
//! active transcript, and on success the session appends exactly two
//! messages to it (the user message and the assistant reply). A failed turn
//! appends nothing.
//!
//! Saved conversations are kept in creation order; `current_index` selects
//! the active one.

use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tracing::{debug, error, info};

use domain::{DomainError, Message, Transcript};

use crate::orchestrator::{RecommendationOrchestrator, TurnOutcome, TurnState, TurnTrace};

/// Shown to the user when a turn fails at the boundary
pub const TURN_FAILED_MESSAGE: &str =
    "Sorry, something went wrong while processing your request. Please try again.";

/// Saved-session titles are cut to this many characters
pub const TITLE_LENGTH: usize = 40;

/// One line of the saved-sessions list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub index: usize,
    pub title: String,
    pub message_count: usize,
    pub active: bool,
}

/// What happened in one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Text for the user; on failure this is [`TURN_FAILED_MESSAGE`]
    pub reply: String,
    /// States visited, starting and ending with `Idle`
    pub path: Vec<TurnState>,
    pub elapsed: Duration,
}

impl TurnReport {
    pub fn is_failure(&self) -> bool {
        self.outcome == TurnOutcome::Failed
    }
}

pub struct ConversationSession {
    orchestrator: RecommendationOrchestrator,
    transcripts: Vec<Transcript>,
    current_index: usize,
}

impl ConversationSession {
    /// Start with a single greeting transcript
    pub fn new(orchestrator: RecommendationOrchestrator) -> Self {
        Self {
            orchestrator,
            transcripts: vec![Transcript::with_greeting()],
            current_index: 0,
        }
    }

    pub fn active(&self) -> &Transcript {
        &self.transcripts[self.current_index]
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn session_count(&self) -> usize {
        self.transcripts.len()
    }

    /// Turn state as seen from outside a turn.
    ///
    /// `handle_message` holds `&mut self` for the whole turn and every turn
    /// ends in `Idle`, so no other state is observable here.
    pub fn state(&self) -> TurnState {
        TurnState::Idle
    }

    /// Append a fresh greeting transcript and make it active
    pub fn new_session(&mut self) -> usize {
        self.transcripts.push(Transcript::with_greeting());
        self.current_index = self.transcripts.len() - 1;
        info!("Started session {}", self.current_index);
        self.current_index
    }

    /// Make a saved transcript the active one
    pub fn switch_to(&mut self, index: usize) -> domain::Result<()> {
        if index >= self.transcripts.len() {
            return Err(DomainError::SessionNotFound {
                index,
                count: self.transcripts.len(),
            });
        }
        self.current_index = index;
        debug!("Switched to session {}", index);
        Ok(())
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.transcripts
            .iter()
            .enumerate()
            .map(|(index, transcript)| SessionSummary {
                index,
                title: session_title(index, transcript),
                message_count: transcript.len(),
                active: index == self.current_index,
            })
            .collect()
    }

    /// Run one turn dated today
    pub async fn handle_message(&mut self, message: &str) -> TurnReport {
        self.handle_message_on(message, Local::now().date_naive()).await
    }

    /// Run one turn as of `today`, then commit it to the active transcript
    pub async fn handle_message_on(&mut self, message: &str, today: NaiveDate) -> TurnReport {
        let started = Instant::now();
        let mut trace = TurnTrace::new();

        let result = self
            .orchestrator
            .run_turn(&self.transcripts[self.current_index], message, today, &mut trace)
            .await;
        debug_assert_eq!(trace.current(), TurnState::Idle);

        let (outcome, reply) = match result {
            Ok(turn) => {
                let transcript = &mut self.transcripts[self.current_index];
                transcript.push(Message::user(message.trim()));
                transcript.push(Message::assistant(turn.reply.clone()));
                (turn.outcome, turn.reply)
            }
            Err(e) => {
                error!("Turn not committed: {}", e);
                (TurnOutcome::Failed, TURN_FAILED_MESSAGE.to_string())
            }
        };

        let elapsed = started.elapsed();
        info!("Turn finished in {:.2?}", elapsed);

        TurnReport {
            outcome,
            reply,
            path: trace.into_states(),
            elapsed,
        }
    }
}

fn session_title(index: usize, transcript: &Transcript) -> String {
    match transcript.first_user_message() {
        Some(first) if first.chars().count() > TITLE_LENGTH => {
            let cut: String = first.chars().take(TITLE_LENGTH).collect();
            format!("{}...", cut)
        }
        Some(first) => first.to_string(),
        None => format!("Chat {}", index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::OrchestratorConfig;
    use crate::testing::{nineties_sci_fi, text, RecordingBackend, Reply, ScriptedModel, SCI_FI_QUERY};
    use domain::{Role, GREETING};
    use pipeline::REPHRASE_MESSAGE;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn session_with(replies: Vec<Reply>) -> ConversationSession {
        let model = Arc::new(ScriptedModel::new(replies));
        let backend = Arc::new(RecordingBackend::returning(nineties_sci_fi()));
        ConversationSession::new(RecommendationOrchestrator::new(
            model,
            backend,
            OrchestratorConfig::default(),
        ))
    }

    #[test]
    fn test_new_session_starts_with_greeting() {
        let session = session_with(vec![]);
        assert_eq!(session.session_count(), 1);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.active().messages(), &[Message::assistant(GREETING)]);
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[test]
    fn test_new_and_switch_sessions() {
        let mut session = session_with(vec![]);

        assert_eq!(session.new_session(), 1);
        assert_eq!(session.new_session(), 2);
        assert_eq!(session.current_index(), 2);

        session.switch_to(0).unwrap();
        assert_eq!(session.current_index(), 0);

        let err = session.switch_to(5).unwrap_err();
        assert_eq!(err, DomainError::SessionNotFound { index: 5, count: 3 });
        assert_eq!(session.current_index(), 0);
    }

    #[tokio::test]
    async fn test_successful_turn_appends_two_messages() {
        let mut session = session_with(vec![text(SCI_FI_QUERY), text("Try **The Matrix**.")]);

        let report = session
            .handle_message_on("  suggest a sci-fi movie from the 90s ", today())
            .await;

        assert_eq!(report.reply, "Try **The Matrix**.");
        assert_eq!(report.path.first(), Some(&TurnState::Idle));
        assert_eq!(report.path.last(), Some(&TurnState::Idle));
        let messages = session.active().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::user("suggest a sci-fi movie from the 90s"));
        assert_eq!(messages[2], Message::assistant("Try **The Matrix**."));
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_non_recommendation_turn_is_committed() {
        let mut session = session_with(vec![text("I only talk about movies.")]);

        let report = session.handle_message_on("what's the weather?", today()).await;

        assert_eq!(report.outcome, TurnOutcome::NotRecommendation);
        assert_eq!(session.active().len(), 3);
        assert_eq!(session.active().last().unwrap().content, "I only talk about movies.");
    }

    #[tokio::test]
    async fn test_unreachable_model_asks_to_rephrase() {
        let mut session = session_with(vec![Reply::Fail]);

        let report = session.handle_message_on("a heist movie", today()).await;

        assert_eq!(report.outcome, TurnOutcome::NotRecommendation);
        assert_eq!(report.reply, REPHRASE_MESSAGE);
        assert_eq!(
            report.path,
            vec![
                TurnState::Idle,
                TurnState::ExtractingQuery,
                TurnState::NonRecommendation,
                TurnState::Idle
            ]
        );
        let messages = session.active().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::user("a heist movie"));
        assert_eq!(messages[2], Message::assistant(REPHRASE_MESSAGE));
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_transcript_untouched() {
        let mut session = session_with(vec![Reply::Panic]);

        let report = session.handle_message_on("anything", today()).await;

        assert!(report.is_failure());
        assert_eq!(report.reply, TURN_FAILED_MESSAGE);
        assert_eq!(report.path.last(), Some(&TurnState::Idle));
        assert_eq!(session.active().len(), 1);
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_turn_goes_to_active_session_only() {
        let mut session = session_with(vec![text("Movies only, please.")]);
        session.new_session();

        session.handle_message_on("hello", today()).await;

        assert_eq!(session.active().len(), 3);
        session.switch_to(0).unwrap();
        assert_eq!(session.active().len(), 1);
    }

    #[tokio::test]
    async fn test_summaries_titles() {
        let mut session = session_with(vec![
            text("Movies only."),
            text("Movies only."),
        ]);
        session
            .handle_message_on("I want something like a slow-burn detective story set in the rain", today())
            .await;
        session.new_session();
        session.new_session();
        session.handle_message_on("short one", today()).await;

        let summaries = session.summaries();

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].title, "I want something like a slow-burn detect...");
        assert_eq!(summaries[0].message_count, 3);
        assert!(!summaries[0].active);
        assert_eq!(summaries[1].title, "Chat 2");
        assert_eq!(summaries[2].title, "short one");
        assert!(summaries[2].active);
        assert_eq!(
            session.active().messages().iter().filter(|m| m.role == Role::User).count(),
            1
        );
    }
}
