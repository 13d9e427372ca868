use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::conversation::{
    ConversationHistory, ConversationSession, ConversationTurn, Delivery, SendRejected,
    SendTicket, TurnResult,
};

struct PanelState {
    open: bool,
    session: ConversationSession,
}

/// The conversation panel next to the character. Owns the session, whose
/// lifetime follows the panel: closing or resetting starts over.
#[derive(Clone)]
pub struct Panel {
    state: Arc<Mutex<PanelState>>,
    visibility: Arc<watch::Sender<bool>>,
}

impl Panel {
    pub fn new(history_limit: usize) -> Self {
        let (visibility, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(PanelState {
                open: false,
                session: ConversationSession::new(history_limit),
            })),
            visibility: Arc::new(visibility),
        }
    }

    /// Visibility changes for whatever draws the panel.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.visibility.subscribe()
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.open
    }

    pub async fn open(&self) {
        let mut state = self.state.lock().await;
        if !state.open {
            state.open = true;
            self.visibility.send_replace(true);
        }
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.session.reset();
        if state.open {
            state.open = false;
            self.visibility.send_replace(false);
        }
    }

    /// Returns whether the panel is open afterwards.
    pub async fn toggle(&self) -> bool {
        let mut state = self.state.lock().await;
        state.open = !state.open;
        if !state.open {
            state.session.reset();
        }
        self.visibility.send_replace(state.open);
        state.open
    }

    /// Clears the conversation but leaves the panel where it is.
    pub async fn reset(&self) {
        self.state.lock().await.session.reset();
    }

    pub async fn history(&self) -> ConversationHistory {
        self.state.lock().await.session.history().clone()
    }

    pub async fn begin_send(&self) -> Result<SendTicket, SendRejected> {
        self.state.lock().await.session.begin_send()
    }

    pub async fn finish_send(
        &self,
        ticket: SendTicket,
        user_turn: &ConversationTurn,
        result: &TurnResult,
    ) -> Delivery {
        self.state
            .lock()
            .await
            .session
            .finish_send(ticket, user_turn, result)
    }

    pub async fn abandon_send(&self, ticket: SendTicket) {
        self.state.lock().await.session.abandon(ticket);
    }
}
