//! Trade lifecycle: the capital choreography around the router.
//!
//! Only a confirmed fill may commit reserved capital or move a position
//! forward; every buy failure path releases the reservation so the ledger
//! is exactly as it was before the attempt. Sell orders never reserve,
//! they settle the existing allocation on fill.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::{
    ExitReason, LedgerError, Position, PositionError, PositionId, SharedLedger, StrategyId,
    TradeOrder,
};
use crate::ports::{Notifier, NotifierEvent};
use crate::position::SharedPositionBook;
use crate::strategy::SizedOrder;

use super::router::{ExecutionError, ExecutionRouter};

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error("Unknown position {0}")]
    UnknownPosition(PositionId),
}

/// Exit multipliers for one strategy.
#[derive(Debug, Clone, Copy)]
pub struct ExitParams {
    pub profit_target: f64,
    pub stop_loss: f64,
}

pub struct LifecycleSettings {
    pub memecoin_exits: ExitParams,
    pub altcoin_exits: ExitParams,
    pub slippage_tolerance: f64,
    pub max_gas_price_gwei: u64,
    pub sell_ttl_secs: i64,
}

impl LifecycleSettings {
    fn exits_for(&self, strategy: StrategyId) -> ExitParams {
        match strategy {
            StrategyId::Memecoin => self.memecoin_exits,
            StrategyId::Altcoin => self.altcoin_exits,
        }
    }
}

pub struct TradeLifecycle {
    router: Arc<ExecutionRouter>,
    ledger: SharedLedger,
    book: SharedPositionBook,
    notifier: Arc<dyn Notifier>,
    settings: LifecycleSettings,
}

impl TradeLifecycle {
    pub fn new(
        router: Arc<ExecutionRouter>,
        ledger: SharedLedger,
        book: SharedPositionBook,
        notifier: Arc<dyn Notifier>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            router,
            ledger,
            book,
            notifier,
            settings,
        }
    }

    /// Execute an accepted buy. On fill the position opens and the
    /// reservation becomes its allocation; on any failure the position is
    /// marked failed and the reservation released in full.
    pub async fn open(&self, sized: SizedOrder) -> Result<PositionId, LifecycleError> {
        let SizedOrder { order, reservation } = sized;
        let position = Position::opening(order.token.clone(), order.strategy, reservation.amount);
        let position_id = position.id;
        self.book.insert(position).await;

        match self.router.execute(&order).await {
            Ok(fill) => {
                let exits = self.settings.exits_for(order.strategy);
                self.book
                    .with_book_mut(|book| {
                        book.get_mut(&position_id)
                            .ok_or(LifecycleError::UnknownPosition(position_id))?
                            .confirm_entry(
                                fill.price_usd,
                                fill.quantity,
                                &fill.tx_hash,
                                exits.profit_target,
                                exits.stop_loss,
                            )
                            .map_err(LifecycleError::from)
                    })
                    .await?;
                self.ledger.commit(&reservation, position_id).await?;
                info!(
                    position_id = %position_id,
                    token = %order.token.address,
                    entry_price = fill.price_usd,
                    "position opened"
                );
                self.notify(NotifierEvent::PositionOpened {
                    position_id,
                    token: order.token.address.clone(),
                    strategy: order.strategy,
                    notional_usd: reservation.amount.to_string(),
                    entry_price: fill.price_usd,
                })
                .await;
                Ok(position_id)
            }
            Err(err) => {
                self.book
                    .with_book_mut(|book| {
                        book.get_mut(&position_id)
                            .ok_or(LifecycleError::UnknownPosition(position_id))?
                            .fail_entry()
                            .map_err(LifecycleError::from)
                    })
                    .await?;
                self.ledger.release(&reservation).await?;
                warn!(order_id = %order.id, %err, "entry failed, reservation released");
                self.notify(NotifierEvent::OrderFailed {
                    order_id: order.id,
                    token: order.token.address.clone(),
                    reason: err.to_string(),
                })
                .await;
                Err(err.into())
            }
        }
    }

    /// Drive one exit attempt. Returns true when the position closed; false
    /// when all routes were exhausted and the position went back to `Open`
    /// for the next cycle.
    pub async fn close(
        &self,
        position_id: PositionId,
        reason: ExitReason,
    ) -> Result<bool, LifecycleError> {
        let position = self
            .book
            .with_book_mut(|book| {
                let position = book
                    .get_mut(&position_id)
                    .ok_or(LifecycleError::UnknownPosition(position_id))?;
                // A liquidation whose previous sell failed is still in
                // Liquidating; retry without a state transition.
                if reason == ExitReason::Liquidation {
                    if position.state != crate::domain::PositionState::Liquidating {
                        position.begin_liquidation()?;
                    }
                } else {
                    position.begin_exit(reason)?;
                }
                Ok::<Position, LifecycleError>(position.clone())
            })
            .await?;

        let order = TradeOrder::sell(
            position.token.clone(),
            position.quantity,
            self.settings.slippage_tolerance,
            self.settings.max_gas_price_gwei,
            position.strategy,
            self.settings.sell_ttl_secs,
        );

        match self.router.execute(&order).await {
            Ok(fill) => {
                let proceeds = match position.proceeds_at(fill.price_usd) {
                    Ok(proceeds) => proceeds,
                    Err(err) => {
                        // A filled sell with a corrupt price cannot be
                        // settled; keep the position tracked for retry.
                        warn!(position_id = %position_id, %err, "corrupt exit price on fill");
                        self.book
                            .with_book_mut(|book| {
                                let position = book
                                    .get_mut(&position_id)
                                    .ok_or(LifecycleError::UnknownPosition(position_id))?;
                                if position.state == crate::domain::PositionState::Closing {
                                    position.exit_failed()?;
                                }
                                Ok::<(), LifecycleError>(())
                            })
                            .await?;
                        return Err(err.into());
                    }
                };
                self.book
                    .with_book_mut(|book| {
                        book.get_mut(&position_id)
                            .ok_or(LifecycleError::UnknownPosition(position_id))?
                            .confirm_exit(fill.price_usd, &fill.tx_hash)
                            .map_err(LifecycleError::from)
                    })
                    .await?;
                let pnl = self.ledger.settle(position_id, proceeds).await?;
                info!(
                    position_id = %position_id,
                    token = %position.token.address,
                    ?reason,
                    %pnl,
                    exit_price = fill.price_usd,
                    "position closed"
                );
                self.notify(NotifierEvent::PositionClosed {
                    position_id,
                    token: position.token.address.clone(),
                    strategy: position.strategy,
                    reason,
                    pnl_usd: pnl.to_string(),
                })
                .await;
                Ok(true)
            }
            Err(err) => {
                warn!(position_id = %position_id, %err, "exit failed, keeping position tracked");
                self.book
                    .with_book_mut(|book| {
                        let position = book
                            .get_mut(&position_id)
                            .ok_or(LifecycleError::UnknownPosition(position_id))?;
                        // A failed liquidation stays in Liquidating and is
                        // retried next cycle; a normal exit returns to Open.
                        if position.state == crate::domain::PositionState::Closing {
                            position.exit_failed()?;
                        }
                        Ok::<(), LifecycleError>(())
                    })
                    .await?;
                Ok(false)
            }
        }
    }

    /// Delivered before returning so a fill is never reported out of order
    /// with its own completion. Adapter timeouts bound the wait; delivery
    /// errors are logged, never propagated into the trade result.
    async fn notify(&self, event: NotifierEvent) {
        if let Err(err) = self.notifier.notify(event).await {
            error!(%err, "notification delivery failed");
        }
    }
}
