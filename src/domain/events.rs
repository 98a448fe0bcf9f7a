//! Chain events flowing from the monitor to the evaluator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::TokenAddress;

/// A new liquidity pool was created for a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchEvent {
    pub token: TokenAddress,
    pub pair_address: TokenAddress,
    pub liquidity_eth: f64,
    pub tx_hash: String,
    pub log_index: u64,
    pub detected_at: DateTime<Utc>,
}

/// Technical entry condition met for an established token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub token: TokenAddress,
    pub signal: EntrySignal,
    pub price_usd: f64,
    pub detected_at: DateTime<Utc>,
}

/// Indicator snapshot the altcoin entry rule is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub rsi: f64,
    pub macd_histogram: f64,
    pub volume_change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainEvent {
    Launch(LaunchEvent),
    Signal(SignalEvent),
}

impl ChainEvent {
    pub fn token(&self) -> &TokenAddress {
        match self {
            Self::Launch(e) => &e.token,
            Self::Signal(e) => &e.token,
        }
    }
}
