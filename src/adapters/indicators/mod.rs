//! Technical indicator source
//!
//! Thin client for an external indicator service that computes RSI, MACD
//! and volume deltas for the altcoin watchlist. The math stays on the
//! service side; this adapter only fetches the latest reading per token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::domain::{EntrySignal, TokenAddress};
use crate::ports::{IndicatorError, IndicatorReading, IndicatorSource};

#[derive(Debug, Deserialize)]
struct ReadingResponse {
    rsi: f64,
    macd_histogram: f64,
    volume_change_pct: f64,
    price_usd: f64,
}

impl From<ReadingResponse> for IndicatorReading {
    fn from(r: ReadingResponse) -> Self {
        IndicatorReading {
            signal: EntrySignal {
                rsi: r.rsi,
                macd_histogram: r.macd_histogram,
                volume_change_pct: r.volume_change_pct,
            },
            price_usd: r.price_usd,
        }
    }
}

pub struct HttpIndicatorSource {
    base_url: String,
    http: Client,
}

impl HttpIndicatorSource {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, IndicatorError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndicatorError::Service(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { base_url, http })
    }
}

#[async_trait]
impl IndicatorSource for HttpIndicatorSource {
    async fn latest_reading(
        &self,
        token: &TokenAddress,
    ) -> Result<Option<IndicatorReading>, IndicatorError> {
        let url = format!("{}/signal/{}", self.base_url, token);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| IndicatorError::Service(e.to_string()))?;
        // Not-yet-computed tokens are a normal answer, not a failure.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(IndicatorError::Service(format!(
                "status {}",
                response.status()
            )));
        }
        let reading: ReadingResponse = response
            .json()
            .await
            .map_err(|e| IndicatorError::Service(e.to_string()))?;
        Ok(Some(reading.into()))
    }
}

/// Used when no indicator service is configured; the watchlist stays idle.
#[derive(Debug, Default)]
pub struct NoIndicators;

#[async_trait]
impl IndicatorSource for NoIndicators {
    async fn latest_reading(
        &self,
        _token: &TokenAddress,
    ) -> Result<Option<IndicatorReading>, IndicatorError> {
        Ok(None)
    }
}
