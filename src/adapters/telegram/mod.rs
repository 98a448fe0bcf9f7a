//! Telegram notifier
//!
//! Sends engine events to a Telegram chat via the Bot API. Formatting lives
//! here; the rest of the engine only knows [`NotifierEvent`]. A log-only
//! notifier covers the disabled case so callers never branch on config.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::ports::{Notifier, NotifierError, NotifierEvent};

/// Telegram notifier configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub timeout: Duration,
}

pub struct TelegramNotifier {
    config: TelegramConfig,
    http: Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, NotifierError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifierError::Delivery(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }
}

/// One-line human rendering of an engine event.
pub fn format_event(event: &NotifierEvent) -> String {
    match event {
        NotifierEvent::EngineStarted => "🚀 Engine started".to_string(),
        NotifierEvent::PositionOpened {
            token,
            strategy,
            notional_usd,
            entry_price,
            ..
        } => format!(
            "📈 {strategy} opened {token}: ${notional_usd} at ${entry_price:.8}"
        ),
        NotifierEvent::PositionClosed {
            token,
            strategy,
            reason,
            pnl_usd,
            ..
        } => format!("📉 {strategy} closed {token} ({reason:?}): P&L ${pnl_usd}"),
        NotifierEvent::OrderFailed {
            order_id,
            token,
            reason,
        } => format!("⚠️ Order {order_id} on {token} failed: {reason}"),
        NotifierEvent::TokenBlacklisted { token, reason } => {
            format!("⛔ Blacklisted {token}: {reason}")
        }
        NotifierEvent::StrategyHalted { strategy, reason } => {
            format!("🛑 {strategy} halted: {reason}")
        }
        NotifierEvent::Fatal { reason } => format!("💀 Engine stopping: {reason}"),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: NotifierEvent) -> Result<(), NotifierError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );
        let body = json!({
            "chat_id": self.config.chat_id,
            "text": format_event(&event),
        });
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifierError::Delivery(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NotifierError::Delivery(format!(
                "Telegram API status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Fallback notifier that writes events to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: NotifierEvent) -> Result<(), NotifierError> {
        info!(event = %format_event(&event), "Notification");
        Ok(())
    }
}
