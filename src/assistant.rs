use std::{sync::Arc, time::Instant};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::capture::{CaptureRegion, CaptureResult, ScreenCapturePipeline};
use crate::conversation::{
    ConversationOrchestrator, Delivery, ImagePayload, SendRejected, ThinkingLevel, TurnConfig,
    TurnResult,
};
use crate::cost::{CostLedger, ExchangeRateSource};
use crate::panel::Panel;
use crate::settings::SettingsStore;
use crate::utils::elapsed_ms;

pub const MISSING_API_KEY_MESSAGE: &str =
    "I need a Gemini API key before I can answer. Set one with `luka key <api-key>`.";

/// Shown in front of the question when a screenshot went along with it.
pub const SCREEN_ANALYSIS_LABEL: &str = "Screen analysis: ";

#[derive(Debug, Clone, Default)]
pub struct AskRequest {
    pub question: String,
    pub with_screen: bool,
    /// Per-call overrides of the stored settings.
    pub thinking_level: Option<ThinkingLevel>,
    pub search_enabled: Option<bool>,
}

impl AskRequest {
    pub fn text(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn screen(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            with_screen: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    /// Nothing typed and no screenshot requested.
    Skipped,
    NeedsApiKey { message: String },
    /// Another question is still waiting for its answer.
    Busy,
    Reply {
        question: String,
        text: String,
        cost_summary: Option<String>,
    },
    Failed { message: String },
    /// The answer arrived after the conversation was reset.
    Discarded,
}

/// The whole question-to-answer flow: capture, backend call, history and
/// cost bookkeeping.
#[derive(Clone)]
pub struct Assistant {
    settings: Arc<SettingsStore>,
    panel: Panel,
    orchestrator: ConversationOrchestrator,
    capture: ScreenCapturePipeline,
    ledger: Arc<Mutex<CostLedger>>,
    rates: Arc<dyn ExchangeRateSource>,
}

impl Assistant {
    pub fn new(
        settings: Arc<SettingsStore>,
        panel: Panel,
        orchestrator: ConversationOrchestrator,
        capture: ScreenCapturePipeline,
        ledger: CostLedger,
        rates: Arc<dyn ExchangeRateSource>,
    ) -> Self {
        Self {
            settings,
            panel,
            orchestrator,
            capture,
            ledger: Arc::new(Mutex::new(ledger)),
            rates,
        }
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub async fn ask(&self, request: AskRequest) -> AskOutcome {
        let question = request.question.trim();
        if question.is_empty() && !request.with_screen {
            return AskOutcome::Skipped;
        }

        let settings = self.settings.get();
        let Some(api_key) = self.settings.api_key() else {
            log::warn!("No API key configured; not contacting the backend");
            return AskOutcome::NeedsApiKey {
                message: MISSING_API_KEY_MESSAGE.into(),
            };
        };

        let ticket = match self.panel.begin_send().await {
            Ok(ticket) => ticket,
            Err(SendRejected::Busy) => {
                log::info!("Ignoring question while another one is in flight");
                return AskOutcome::Busy;
            }
        };

        let started = Instant::now();
        let image = if request.with_screen {
            match self.capture.capture_full().await {
                Ok(capture) => Some(ImagePayload::from(&capture)),
                Err(err) if question.is_empty() => {
                    log::error!("Screen capture failed: {err:#}");
                    self.panel.abandon_send(ticket).await;
                    return AskOutcome::Failed {
                        message: format!("Screen capture failed: {err:#}"),
                    };
                }
                Err(err) => {
                    log::warn!("Screen capture failed, asking without it: {err:#}");
                    None
                }
            }
        } else {
            None
        };
        let with_image = image.is_some();

        let config = TurnConfig {
            api_key,
            model: settings.model.clone(),
            persona_directive: settings.persona_prompt.clone(),
            thinking_level: request.thinking_level.unwrap_or(settings.thinking_level),
            search_enabled: request.search_enabled.unwrap_or(settings.search_enabled),
        };

        let prepared = self
            .orchestrator
            .prepare(question, image, ticket.history(), &config);
        let result = self.orchestrator.dispatch(&prepared, &config).await;
        let delivery = self
            .panel
            .finish_send(ticket, &prepared.user_turn, &result)
            .await;

        // The call was billed even if nobody is waiting for the answer.
        let session_cost = self.record_cost(&result).await;

        log::info!(
            "Ask finished in {}ms (screen: {with_image}, delivery: {delivery:?})",
            elapsed_ms(started)
        );

        match (delivery, result) {
            (Delivery::Discarded, _) => AskOutcome::Discarded,
            (Delivery::Applied, TurnResult::Error { message }) => AskOutcome::Failed { message },
            (Delivery::Applied, TurnResult::Reply { text, usage }) => {
                let cost_summary = match (settings.show_cost, usage) {
                    (true, Some(_)) => Some(self.ledger.lock().await.formatted_summary(session_cost)),
                    _ => None,
                };
                let shown = prepared.user_turn.text();
                let question = if with_image {
                    format!("{SCREEN_ANALYSIS_LABEL}{shown}")
                } else {
                    shown
                };
                AskOutcome::Reply {
                    question,
                    text,
                    cost_summary,
                }
            }
        }
    }

    /// Blurred backdrop for the panel bubble.
    pub async fn capture_backdrop(&self, region: CaptureRegion) -> Option<CaptureResult> {
        let radius = self.settings.get().blur_radius;
        self.capture.capture_region(region, radius).await
    }

    /// Current totals with a rate refreshed if it has gone stale.
    pub async fn cost_summary(&self) -> String {
        let mut ledger = self.ledger.lock().await;
        ledger
            .refresh_rate_if_stale(Utc::now().timestamp_millis(), self.rates.as_ref())
            .await;
        ledger.formatted_summary(0.0)
    }

    pub async fn cumulative_usd(&self) -> f64 {
        self.ledger.lock().await.cumulative_usd()
    }

    async fn record_cost(&self, result: &TurnResult) -> f64 {
        let Some(usage) = result.usage() else {
            return 0.0;
        };
        let mut ledger = self.ledger.lock().await;
        ledger
            .refresh_rate_if_stale(Utc::now().timestamp_millis(), self.rates.as_ref())
            .await;
        ledger.record_usage(Some(usage))
    }
}
