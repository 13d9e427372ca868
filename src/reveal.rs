use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, Mutex},
    time,
};
use tokio_util::sync::CancellationToken;

/// Character-by-character reveal of a reply.
///
/// Restartable: `start` discards whatever was being revealed. Prefixes always
/// end on a char boundary.
#[derive(Debug, Clone, Default)]
pub struct TypedReveal {
    text: String,
    shown: usize,
    total: usize,
    running: bool,
}

impl TypedReveal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.total = self.text.chars().count();
        self.shown = 0;
        self.running = true;
    }

    /// Shows one more character. `None` once everything is visible or the
    /// reveal was cancelled.
    pub fn tick(&mut self) -> Option<&str> {
        if !self.running {
            return None;
        }
        if self.shown >= self.total {
            self.running = false;
            return None;
        }
        self.shown += 1;
        if self.shown == self.total {
            self.running = false;
        }
        Some(self.visible())
    }

    /// Stops revealing; what is visible stays visible.
    pub fn cancel(&mut self) {
        self.running = false;
    }

    /// Jumps to the full text.
    pub fn finish(&mut self) -> &str {
        self.shown = self.total;
        self.running = false;
        &self.text
    }

    pub fn visible(&self) -> &str {
        let end = self
            .text
            .char_indices()
            .nth(self.shown)
            .map_or(self.text.len(), |(index, _)| index);
        &self.text[..end]
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Drives a [`TypedReveal`] on a fixed interval, streaming each prefix.
///
/// Starting a new reveal cancels the previous one, whose stream then ends.
#[derive(Clone)]
pub struct Revealer {
    interval: Duration,
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Revealer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn play(&self, text: impl Into<String>) -> mpsc::Receiver<String> {
        let cancel = CancellationToken::new();
        {
            let mut current = self.current.lock().await;
            if let Some(previous) = current.replace(cancel.clone()) {
                previous.cancel();
            }
        }

        let (tx, rx) = mpsc::channel(16);
        let mut reveal = TypedReveal::new();
        reveal.start(text);
        let period = self.interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(prefix) = reveal.tick() else {
                            break;
                        };
                        if tx.send(prefix.to_owned()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        rx
    }

    pub async fn cancel(&self) {
        if let Some(token) = self.current.lock().await.take() {
            token.cancel();
        }
    }
}
