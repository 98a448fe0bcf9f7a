//! Position lifecycle state machine
//!
//! `Opening -> Open -> Closing -> Closed`, with `Opening -> Failed` when the
//! entry fill never confirms and `Open -> Liquidating -> Closed` on forced
//! exit. A failed exit returns `Closing -> Open` so the position is never
//! silently dropped from tracking. Every transition is an explicit method;
//! illegal transitions are errors, not flag soup.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::order::StrategyId;
use super::token::Token;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Illegal transition: {from:?} -> {to:?}")]
    IllegalTransition { from: PositionState, to: PositionState },
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(f64),
    #[error("Invalid exit price: {0}")]
    InvalidExitPrice(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// Entry order submitted, fill not yet confirmed.
    Opening,
    /// Entry fill confirmed; monitored for exit conditions.
    Open,
    /// Exit order in flight.
    Closing,
    /// Forced exit in flight (blacklist hit or manual override).
    Liquidating,
    /// Exit fill confirmed; P&L settled.
    Closed,
    /// Entry fill never confirmed; no capital committed.
    Failed,
}

/// Why a position left the `Open` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    ProfitTarget,
    StopLoss,
    Rebalance,
    Liquidation,
    Manual,
    MaxHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(Uuid);

impl PositionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PositionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PositionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub token: Token,
    pub strategy: StrategyId,
    pub state: PositionState,
    /// USD committed at entry; settled back to the ledger on close.
    pub entry_notional: Decimal,
    pub entry_price: f64,
    pub quantity: f64,
    pub profit_target_price: f64,
    pub stop_loss_price: f64,
    pub opened_at: DateTime<Utc>,
    pub entry_tx: Option<String>,
    pub exit_tx: Option<String>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Create a position in `Opening` while the entry order is in flight.
    pub fn opening(token: Token, strategy: StrategyId, entry_notional: Decimal) -> Self {
        Self {
            id: PositionId::new(),
            token,
            strategy,
            state: PositionState::Opening,
            entry_notional,
            entry_price: 0.0,
            quantity: 0.0,
            profit_target_price: 0.0,
            stop_loss_price: 0.0,
            opened_at: Utc::now(),
            entry_tx: None,
            exit_tx: None,
            exit_price: None,
            exit_reason: None,
            closed_at: None,
        }
    }

    fn illegal(&self, to: PositionState) -> PositionError {
        PositionError::IllegalTransition {
            from: self.state,
            to,
        }
    }

    /// `Opening -> Open`: entry fill confirmed. Target and stop prices are
    /// derived from the configured multipliers.
    pub fn confirm_entry(
        &mut self,
        entry_price: f64,
        quantity: f64,
        tx_hash: &str,
        profit_target_mult: f64,
        stop_loss_mult: f64,
    ) -> Result<(), PositionError> {
        if self.state != PositionState::Opening {
            return Err(self.illegal(PositionState::Open));
        }
        if entry_price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(entry_price));
        }
        if quantity <= 0.0 {
            return Err(PositionError::InvalidQuantity(quantity));
        }
        self.entry_price = entry_price;
        self.quantity = quantity;
        self.entry_tx = Some(tx_hash.to_string());
        self.profit_target_price = entry_price * profit_target_mult;
        self.stop_loss_price = entry_price * stop_loss_mult;
        self.opened_at = Utc::now();
        self.state = PositionState::Open;
        Ok(())
    }

    /// `Opening -> Failed`: entry fill never confirmed.
    pub fn fail_entry(&mut self) -> Result<(), PositionError> {
        if self.state != PositionState::Opening {
            return Err(self.illegal(PositionState::Failed));
        }
        self.state = PositionState::Failed;
        Ok(())
    }

    /// `Open -> Closing`: an exit condition fired.
    pub fn begin_exit(&mut self, reason: ExitReason) -> Result<(), PositionError> {
        if self.state != PositionState::Open {
            return Err(self.illegal(PositionState::Closing));
        }
        self.exit_reason = Some(reason);
        self.state = PositionState::Closing;
        Ok(())
    }

    /// `Open -> Liquidating`: forced exit, e.g. the token was blacklisted
    /// after entry.
    pub fn begin_liquidation(&mut self) -> Result<(), PositionError> {
        if self.state != PositionState::Open {
            return Err(self.illegal(PositionState::Liquidating));
        }
        self.exit_reason = Some(ExitReason::Liquidation);
        self.state = PositionState::Liquidating;
        Ok(())
    }

    /// `Closing -> Open`: the exit order exhausted all routes. The position
    /// stays tracked and is re-evaluated next cycle.
    pub fn exit_failed(&mut self) -> Result<(), PositionError> {
        if self.state != PositionState::Closing {
            return Err(self.illegal(PositionState::Open));
        }
        self.exit_reason = None;
        self.state = PositionState::Open;
        Ok(())
    }

    /// `Closing|Liquidating -> Closed`: exit fill confirmed.
    pub fn confirm_exit(&mut self, exit_price: f64, tx_hash: &str) -> Result<(), PositionError> {
        if self.state != PositionState::Closing && self.state != PositionState::Liquidating {
            return Err(self.illegal(PositionState::Closed));
        }
        self.exit_price = Some(exit_price);
        self.exit_tx = Some(tx_hash.to_string());
        self.closed_at = Some(Utc::now());
        self.state = PositionState::Closed;
        Ok(())
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            PositionState::Opening
                | PositionState::Open
                | PositionState::Closing
                | PositionState::Liquidating
        )
    }

    /// Unrealized P&L percentage against the entry price.
    pub fn pnl_pct(&self, current_price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        ((current_price - self.entry_price) / self.entry_price) * 100.0
    }

    /// USD proceeds if sold at `exit_price`, proportional to entry notional.
    /// A non-finite or negative price ratio is a corrupt quote and is
    /// rejected rather than settled.
    pub fn proceeds_at(&self, exit_price: f64) -> Result<Decimal, PositionError> {
        if self.entry_price <= 0.0 {
            return Ok(self.entry_notional);
        }
        let ratio = exit_price / self.entry_price;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(PositionError::InvalidExitPrice(exit_price));
        }
        let ratio = Decimal::try_from(ratio).map_err(|_| PositionError::InvalidExitPrice(exit_price))?;
        Ok(self.entry_notional * ratio)
    }

    pub fn age_hours(&self) -> f64 {
        (Utc::now() - self.opened_at).num_seconds() as f64 / 3600.0
    }
}
