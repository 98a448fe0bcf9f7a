use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ExitReason, OrderId, PositionId, StrategyId, TokenAddress};

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// User-facing notifications. Trade events (opened, closed, failed) are
/// delivered before the trade call returns; engine-level events are spawned.
/// Delivery errors are logged, never surfaced into trading results.
#[derive(Debug, Clone)]
pub enum NotifierEvent {
    EngineStarted,
    PositionOpened {
        position_id: PositionId,
        token: TokenAddress,
        strategy: StrategyId,
        notional_usd: String,
        entry_price: f64,
    },
    PositionClosed {
        position_id: PositionId,
        token: TokenAddress,
        strategy: StrategyId,
        reason: ExitReason,
        pnl_usd: String,
    },
    OrderFailed {
        order_id: OrderId,
        token: TokenAddress,
        reason: String,
    },
    TokenBlacklisted {
        token: TokenAddress,
        reason: String,
    },
    StrategyHalted {
        strategy: StrategyId,
        reason: String,
    },
    Fatal {
        reason: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotifierEvent) -> Result<(), NotifierError>;
}
