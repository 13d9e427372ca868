use std::{sync::Arc, time::Instant};

use super::backend::AiBackend;
use super::request::{user_turn, RequestEnvelope, TurnConfig};
use super::response::extract_reply;
use super::types::{ConversationHistory, ConversationTurn, ImagePayload};
use crate::cost::UsageRecord;
use crate::utils::elapsed_ms;

#[derive(Debug, Clone, PartialEq)]
pub enum TurnResult {
    Reply {
        text: String,
        usage: Option<UsageRecord>,
    },
    Error {
        message: String,
    },
}

impl TurnResult {
    pub fn error(message: impl Into<String>) -> Self {
        TurnResult::Error {
            message: message.into(),
        }
    }

    pub fn usage(&self) -> Option<&UsageRecord> {
        match self {
            TurnResult::Reply { usage, .. } => usage.as_ref(),
            TurnResult::Error { .. } => None,
        }
    }
}

/// A request ready to go out, plus the user turn that will be remembered if
/// it succeeds.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub user_turn: ConversationTurn,
    pub envelope: RequestEnvelope,
}

#[derive(Clone)]
pub struct ConversationOrchestrator {
    backend: Arc<dyn AiBackend>,
}

impl ConversationOrchestrator {
    pub fn new(backend: Arc<dyn AiBackend>) -> Self {
        Self { backend }
    }

    pub fn prepare(
        &self,
        question: &str,
        image: Option<ImagePayload>,
        history: &ConversationHistory,
        config: &TurnConfig,
    ) -> PreparedTurn {
        let user_turn = user_turn(question, image);
        let envelope = RequestEnvelope::build(user_turn.clone(), history, config);
        PreparedTurn {
            user_turn,
            envelope,
        }
    }

    /// Calls the backend. Every failure comes back as `TurnResult::Error`.
    pub async fn dispatch(&self, prepared: &PreparedTurn, config: &TurnConfig) -> TurnResult {
        if prepared.user_turn.text().is_empty() {
            return TurnResult::error("nothing to send");
        }

        let started = Instant::now();
        match self.backend.generate(&config.api_key, &prepared.envelope).await {
            Ok(payload) => {
                let reply = extract_reply(&payload);
                log::info!(
                    "{} replied in {}ms ({} chars, usage: {:?})",
                    self.backend.name(),
                    elapsed_ms(started),
                    reply.text.chars().count(),
                    reply.usage
                );
                TurnResult::Reply {
                    text: reply.text,
                    usage: reply.usage,
                }
            }
            Err(err) => {
                log::error!(
                    "{} call failed after {}ms: {err}",
                    self.backend.name(),
                    elapsed_ms(started)
                );
                TurnResult::error(err.to_string())
            }
        }
    }

    /// One complete turn against a caller-owned history. The history only
    /// changes when the backend answered.
    pub async fn send_turn(
        &self,
        question: &str,
        image: Option<ImagePayload>,
        history: &mut ConversationHistory,
        config: &TurnConfig,
    ) -> TurnResult {
        let prepared = self.prepare(question, image, history, config);
        let result = self.dispatch(&prepared, config).await;

        if let TurnResult::Reply { text, .. } = &result {
            history.record_exchange(&prepared.user_turn, text);
        }
        result
    }
}
