//! Scripted `LanguageModel` for tests in this crate and its dependents.
//!
//! Enabled by the `test-util` feature.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use domain::{Message, ModelProvider};

use crate::{LanguageModel, LlmClientError};

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Fail as if the backend were unreachable
    Fail,
    /// Never answer
    Hang,
    Panic,
}

pub fn text(reply: &str) -> Reply {
    Reply::Text(reply.to_string())
}

/// Plays back scripted replies in order and records every call.
///
/// Once the script runs out, every call fails with `Unavailable`.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Text replies, in order
    pub fn script(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| text(r)).collect())
    }

    pub fn replying(reply: &str) -> Self {
        Self::script(&[reply])
    }

    pub fn failing() -> Self {
        Self::new(vec![Reply::Fail])
    }

    /// Messages sent by each call so far
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmClientError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail) | None => Err(LlmClientError::Unavailable("connection refused".to_string())),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Panic) => panic!("model exploded"),
        }
    }

    fn provider(&self) -> ModelProvider {
        ModelProvider::Hosted
    }
}
