//! Trade orders
//!
//! A `TradeOrder` is created by the evaluator (or the position manager for
//! exits) and owned exclusively by the execution router until it reaches a
//! terminal state. Orders carry a deadline; the router drops expired orders
//! without submitting, because chain state has moved since detection.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token::Token;

/// Which strategy originated an order or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    Memecoin,
    Altcoin,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Memecoin => "memecoin",
            StrategyId::Altcoin => "altcoin",
        }
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A sized, risk-checked order ready for routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOrder {
    pub id: OrderId,
    pub token: Token,
    pub side: Side,
    /// Notional in USD for buys; for sells the quantity field governs.
    pub notional_usd: Decimal,
    /// Token quantity to sell (zero for buys).
    pub quantity: f64,
    pub max_slippage: f64,
    pub max_gas_price_gwei: u64,
    pub strategy: StrategyId,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl TradeOrder {
    pub fn buy(
        token: Token,
        notional_usd: Decimal,
        max_slippage: f64,
        max_gas_price_gwei: u64,
        strategy: StrategyId,
        ttl_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            token,
            side: Side::Buy,
            notional_usd,
            quantity: 0.0,
            max_slippage,
            max_gas_price_gwei,
            strategy,
            created_at: now,
            deadline: now + Duration::seconds(ttl_secs),
        }
    }

    pub fn sell(
        token: Token,
        quantity: f64,
        max_slippage: f64,
        max_gas_price_gwei: u64,
        strategy: StrategyId,
        ttl_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            token,
            side: Side::Sell,
            notional_usd: Decimal::ZERO,
            quantity,
            max_slippage,
            max_gas_price_gwei,
            strategy,
            created_at: now,
            deadline: now + Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.deadline
    }
}

/// A confirmed on-chain fill. The only event that may mutate the ledger
/// or create a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub tx_hash: String,
    pub venue: String,
    /// Executed price in USD per token.
    pub price_usd: f64,
    /// Token quantity bought or sold.
    pub quantity: f64,
    pub gas_used: u64,
    pub filled_at: DateTime<Utc>,
}
