use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;

pub const OPEN_ER_API_URL: &str = "https://open.er-api.com/v6/latest/USD";

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRate {
    /// Local currency units per US dollar.
    pub rate: f64,
    /// Human readable time of the fetch, shown next to the rate.
    pub fetched_at_label: String,
}

#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn fetch(&self) -> Result<ExchangeRate>;
}

#[derive(Deserialize)]
struct LatestRates {
    rates: std::collections::HashMap<String, f64>,
}

/// USD based rates from open.er-api.com, reading a single target currency.
#[derive(Clone)]
pub struct OpenErApiSource {
    url: String,
    currency: String,
    http_client: reqwest::Client,
}

impl OpenErApiSource {
    pub fn new(currency: impl Into<String>) -> Result<Self> {
        Self::with_url(OPEN_ER_API_URL, currency)
    }

    pub fn with_url(url: impl Into<String>, currency: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build exchange-rate HTTP client")?;

        Ok(Self {
            url: url.into(),
            currency: currency.into(),
            http_client,
        })
    }
}

#[async_trait]
impl ExchangeRateSource for OpenErApiSource {
    async fn fetch(&self) -> Result<ExchangeRate> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .context("exchange-rate request failed")?
            .error_for_status()
            .context("exchange-rate endpoint returned an error status")?;

        let body: LatestRates = response
            .json()
            .await
            .context("exchange-rate response was not the expected JSON")?;

        let rate = body
            .rates
            .get(&self.currency)
            .copied()
            .ok_or_else(|| anyhow!("no {} rate in response", self.currency))?;

        Ok(ExchangeRate {
            rate,
            fetched_at_label: fetch_label_now(),
        })
    }
}

pub fn fetch_label_now() -> String {
    Local::now().format("%Y/%m/%d %H:%M").to_string()
}
