use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::rate::{ExchangeRate, ExchangeRateSource};
use crate::store::KeyValueStore;

pub const PRICE_PER_MILLION_INPUT_USD: f64 = 0.50;
pub const PRICE_PER_MILLION_OUTPUT_USD: f64 = 3.00;
pub const DEFAULT_EXCHANGE_RATE: f64 = 154.0;
pub const RATE_STALE_AFTER_MS: i64 = 86_400_000;
pub const RATE_UNAVAILABLE_LABEL: &str = "rate unavailable";

const LEDGER_KEY: &str = "cost_ledger";

/// Token counts reported by the backend for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input_per_million_usd: f64,
    pub output_per_million_usd: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_million_usd: PRICE_PER_MILLION_INPUT_USD,
            output_per_million_usd: PRICE_PER_MILLION_OUTPUT_USD,
        }
    }
}

impl Pricing {
    pub fn cost_usd(&self, usage: &UsageRecord) -> f64 {
        let input = (usage.prompt_tokens as f64 / 1_000_000.0) * self.input_per_million_usd;
        let output = (usage.completion_tokens as f64 / 1_000_000.0) * self.output_per_million_usd;
        input + output
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostLedgerState {
    #[serde(rename = "cumulativeUSD")]
    pub cumulative_usd: f64,
    pub exchange_rate: f64,
    pub rate_timestamp: String,
    pub last_fetched_at_ms: i64,
}

impl Default for CostLedgerState {
    fn default() -> Self {
        Self {
            cumulative_usd: 0.0,
            exchange_rate: DEFAULT_EXCHANGE_RATE,
            rate_timestamp: String::new(),
            last_fetched_at_ms: 0,
        }
    }
}

impl CostLedgerState {
    /// Decodes persisted state field by field; anything unusable is replaced
    /// by its default.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let number = |key: &str| value.get(key).and_then(Value::as_f64).filter(|n| n.is_finite());

        Self {
            cumulative_usd: number("cumulativeUSD")
                .filter(|usd| *usd >= 0.0)
                .unwrap_or(defaults.cumulative_usd),
            exchange_rate: number("exchangeRate")
                .filter(|rate| *rate > 0.0)
                .unwrap_or(defaults.exchange_rate),
            rate_timestamp: value
                .get("rateTimestamp")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or(defaults.rate_timestamp),
            last_fetched_at_ms: value
                .get("lastFetchedAtMs")
                .and_then(Value::as_i64)
                .unwrap_or(defaults.last_fetched_at_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateRefresh {
    /// Cache younger than a day; nothing fetched.
    Fresh,
    Updated(ExchangeRate),
    /// Fetch failed; the fallback rate is shown until the next attempt.
    Fallback(ExchangeRate),
}

/// Running estimate of what the backend has cost so far.
pub struct CostLedger {
    store: Arc<dyn KeyValueStore>,
    state: CostLedgerState,
    pricing: Pricing,
    fallback: Option<ExchangeRate>,
}

impl CostLedger {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_pricing(store, Pricing::default())
    }

    pub fn with_pricing(store: Arc<dyn KeyValueStore>, pricing: Pricing) -> Self {
        let state = store
            .load(LEDGER_KEY)
            .map(|value| CostLedgerState::from_value(&value))
            .unwrap_or_default();

        Self {
            store,
            state,
            pricing,
            fallback: None,
        }
    }

    pub fn state(&self) -> &CostLedgerState {
        &self.state
    }

    pub fn cumulative_usd(&self) -> f64 {
        self.state.cumulative_usd
    }

    /// The rate currently used for display, including a fallback after a
    /// failed fetch.
    pub fn effective_rate(&self) -> ExchangeRate {
        self.fallback.clone().unwrap_or_else(|| ExchangeRate {
            rate: self.state.exchange_rate,
            fetched_at_label: self.state.rate_timestamp.clone(),
        })
    }

    pub fn is_rate_stale(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.state.last_fetched_at_ms) > RATE_STALE_AFTER_MS
    }

    pub async fn refresh_rate_if_stale(
        &mut self,
        now_ms: i64,
        source: &dyn ExchangeRateSource,
    ) -> RateRefresh {
        if !self.is_rate_stale(now_ms) {
            return RateRefresh::Fresh;
        }

        let fetched = match source.fetch().await {
            Ok(rate) if rate.rate.is_finite() && rate.rate > 0.0 => Ok(rate),
            Ok(rate) => Err(anyhow::anyhow!("unusable exchange rate {}", rate.rate)),
            Err(err) => Err(err),
        };

        match fetched {
            Ok(rate) => {
                log::info!("Exchange rate refreshed: {} ({})", rate.rate, rate.fetched_at_label);
                self.state.exchange_rate = rate.rate;
                self.state.rate_timestamp = rate.fetched_at_label.clone();
                self.state.last_fetched_at_ms = now_ms;
                self.fallback = None;
                self.persist();
                RateRefresh::Updated(rate)
            }
            Err(err) => {
                log::warn!("Exchange rate fetch failed, using fallback: {err:#}");
                let fallback = ExchangeRate {
                    rate: DEFAULT_EXCHANGE_RATE,
                    fetched_at_label: RATE_UNAVAILABLE_LABEL.into(),
                };
                self.fallback = Some(fallback.clone());
                RateRefresh::Fallback(fallback)
            }
        }
    }

    pub fn session_cost(&self, usage: Option<&UsageRecord>) -> f64 {
        usage.map(|usage| self.pricing.cost_usd(usage)).unwrap_or(0.0)
    }

    /// Adds the cost of one call to the running total and returns it.
    pub fn record_usage(&mut self, usage: Option<&UsageRecord>) -> f64 {
        let Some(usage) = usage else {
            return 0.0;
        };

        let session_cost = self.session_cost(Some(usage)).max(0.0);
        self.state.cumulative_usd += session_cost;
        self.persist();
        session_cost
    }

    pub fn formatted_summary(&self, session_cost_usd: f64) -> String {
        let rate = self.effective_rate();
        let session_local = session_cost_usd * rate.rate;
        let total_local = self.state.cumulative_usd * rate.rate;
        let label = if rate.fetched_at_label.is_empty() {
            String::new()
        } else {
            format!(" {}", rate.fetched_at_label)
        };

        format!(
            "This time: ~{session_local:.2} JPY / Total: ~{total_local:.2} JPY\n(1 USD = {:.0} JPY{label})",
            rate.rate
        )
    }

    fn persist(&self) {
        let result = serde_json::to_value(&self.state)
            .map_err(anyhow::Error::from)
            .and_then(|value| self.store.persist(LEDGER_KEY, value));
        if let Err(err) = result {
            log::error!("Failed to persist cost ledger: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedRate {
        rate: Option<f64>,
        calls: AtomicUsize,
    }

    impl ScriptedRate {
        fn ok(rate: f64) -> Self {
            Self {
                rate: Some(rate),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                rate: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExchangeRateSource for ScriptedRate {
        async fn fetch(&self) -> anyhow::Result<ExchangeRate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rate
                .map(|rate| ExchangeRate {
                    rate,
                    fetched_at_label: "2026/10/16 09:00".into(),
                })
                .ok_or_else(|| anyhow!("offline"))
        }
    }

    fn ledger_with_fetch_at(last_fetched_at_ms: i64) -> (Arc<MemoryStore>, CostLedger) {
        let store = Arc::new(MemoryStore::new());
        store
            .persist(
                LEDGER_KEY,
                json!({
                    "cumulativeUSD": 1.25,
                    "exchangeRate": 150.0,
                    "rateTimestamp": "2026/10/15 09:00",
                    "lastFetchedAtMs": last_fetched_at_ms
                }),
            )
            .unwrap();
        let ledger = CostLedger::load(store.clone());
        (store, ledger)
    }

    #[test]
    fn one_million_prompt_tokens_cost_fifty_cents() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = CostLedger::load(store);
        let cost = ledger.record_usage(Some(&UsageRecord {
            prompt_tokens: 1_000_000,
            completion_tokens: 0,
        }));
        assert_eq!(cost, 0.50);
        assert_eq!(ledger.cumulative_usd(), 0.50);
    }

    #[test]
    fn absent_usage_costs_nothing_and_leaves_total() {
        let (_, mut ledger) = ledger_with_fetch_at(0);
        assert_eq!(ledger.record_usage(None), 0.0);
        assert_eq!(ledger.cumulative_usd(), 1.25);
    }

    #[test]
    fn cumulative_total_is_sum_of_sessions() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = CostLedger::load(store.clone());
        let usages = [
            UsageRecord { prompt_tokens: 1200, completion_tokens: 40 },
            UsageRecord { prompt_tokens: 0, completion_tokens: 0 },
            UsageRecord { prompt_tokens: 350_000, completion_tokens: 9_000 },
            UsageRecord { prompt_tokens: 17, completion_tokens: 2_500_000 },
        ];

        let mut expected = 0.0;
        let mut previous = ledger.cumulative_usd();
        for usage in &usages {
            expected += ledger.record_usage(Some(usage));
            assert!(ledger.cumulative_usd() >= previous);
            previous = ledger.cumulative_usd();
        }
        assert!((ledger.cumulative_usd() - expected).abs() < 1e-12);

        let reloaded = CostLedger::load(store);
        assert!((reloaded.cumulative_usd() - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn refresh_attempted_once_a_day_has_passed() {
        let now = 1_800_000_000_000;
        let (store, mut ledger) = ledger_with_fetch_at(now - 86_400_001);
        let source = ScriptedRate::ok(149.5);

        let outcome = ledger.refresh_rate_if_stale(now, &source).await;
        assert!(matches!(outcome, RateRefresh::Updated(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.state().exchange_rate, 149.5);
        assert_eq!(ledger.state().last_fetched_at_ms, now);

        let persisted = CostLedgerState::from_value(&store.load(LEDGER_KEY).unwrap());
        assert_eq!(persisted.exchange_rate, 149.5);
    }

    #[tokio::test]
    async fn refresh_skipped_inside_the_window() {
        let now = 1_800_000_000_000;
        let (_, mut ledger) = ledger_with_fetch_at(now - 86_400_000 + 1);
        let source = ScriptedRate::ok(149.5);

        let outcome = ledger.refresh_rate_if_stale(now, &source).await;
        assert_eq!(outcome, RateRefresh::Fresh);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.effective_rate().rate, 150.0);
        assert_eq!(ledger.effective_rate().fetched_at_label, "2026/10/15 09:00");
    }

    #[tokio::test]
    async fn failed_fetch_uses_fallback_and_retries_next_time() {
        let now = 1_800_000_000_000;
        let last = now - 2 * RATE_STALE_AFTER_MS;
        let (_, mut ledger) = ledger_with_fetch_at(last);
        let source = ScriptedRate::failing();

        let outcome = ledger.refresh_rate_if_stale(now, &source).await;
        assert!(matches!(outcome, RateRefresh::Fallback(_)));
        assert_eq!(ledger.effective_rate().rate, DEFAULT_EXCHANGE_RATE);
        assert_eq!(ledger.effective_rate().fetched_at_label, RATE_UNAVAILABLE_LABEL);
        assert_eq!(ledger.state().last_fetched_at_ms, last);
        assert_eq!(ledger.state().exchange_rate, 150.0);

        ledger.refresh_rate_if_stale(now + 1, &source).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn corrupt_state_falls_back_per_field() {
        let state = CostLedgerState::from_value(&json!({
            "cumulativeUSD": "lots",
            "exchangeRate": 160.0,
            "rateTimestamp": 42,
            "lastFetchedAtMs": 1000
        }));
        assert_eq!(state.cumulative_usd, 0.0);
        assert_eq!(state.exchange_rate, 160.0);
        assert_eq!(state.rate_timestamp, "");
        assert_eq!(state.last_fetched_at_ms, 1000);
    }

    #[test]
    fn summary_converts_with_two_decimals() {
        let (_, ledger) = ledger_with_fetch_at(0);
        let summary = ledger.formatted_summary(0.01);
        assert_eq!(
            summary,
            "This time: ~1.50 JPY / Total: ~187.50 JPY\n(1 USD = 150 JPY 2026/10/15 09:00)"
        );
    }
}
