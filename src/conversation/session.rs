use uuid::Uuid;

use super::orchestrator::TurnResult;
use super::types::{ConversationHistory, ConversationTurn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    /// Another send on this session has not come back yet.
    Busy,
}

/// Proof that a send was admitted. Carries the history as it was when the
/// send started so the backend call can run without holding the session.
#[derive(Debug)]
pub struct SendTicket {
    id: u64,
    epoch: u64,
    history: ConversationHistory,
}

impl SendTicket {
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    /// The session was reset while the call was in flight.
    Discarded,
}

/// Conversation state for one opening of the panel.
#[derive(Debug)]
pub struct ConversationSession {
    id: Uuid,
    epoch: u64,
    history: ConversationHistory,
    next_ticket: u64,
    in_flight: Option<u64>,
}

impl ConversationSession {
    pub fn new(history_limit: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch: 0,
            history: ConversationHistory::with_limit(history_limit),
            next_ticket: 0,
            in_flight: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn begin_send(&mut self) -> Result<SendTicket, SendRejected> {
        if self.in_flight.is_some() {
            return Err(SendRejected::Busy);
        }

        self.next_ticket += 1;
        self.in_flight = Some(self.next_ticket);
        Ok(SendTicket {
            id: self.next_ticket,
            epoch: self.epoch,
            history: self.history.clone(),
        })
    }

    /// Folds a finished call back in. Only a successful reply from the
    /// current epoch touches the history.
    pub fn finish_send(
        &mut self,
        ticket: SendTicket,
        user_turn: &ConversationTurn,
        result: &TurnResult,
    ) -> Delivery {
        self.release(&ticket);

        if ticket.epoch != self.epoch {
            log::info!(
                "Dropping response for session {} epoch {} (now {})",
                self.id,
                ticket.epoch,
                self.epoch
            );
            return Delivery::Discarded;
        }

        if let TurnResult::Reply { text, .. } = result {
            self.history.record_exchange(user_turn, text);
        }
        Delivery::Applied
    }

    /// Gives the busy slot back without recording anything.
    pub fn abandon(&mut self, ticket: SendTicket) {
        self.release(&ticket);
    }

    /// Clears history and invalidates anything still in flight.
    pub fn reset(&mut self) {
        self.history.clear();
        self.epoch += 1;
        self.in_flight = None;
    }

    fn release(&mut self, ticket: &SendTicket) {
        if self.in_flight == Some(ticket.id) {
            self.in_flight = None;
        }
    }
}
