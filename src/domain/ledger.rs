//! Capital ledger
//!
//! Single shared store for per-strategy capital. Every capital-affecting
//! transition is one of four transactional operations:
//!
//! - `reserve`  - taken when an order is sized, before submission
//! - `commit`   - reservation becomes an allocation on a confirmed buy fill
//! - `release`  - rollback when the order fails, expires, or is rejected
//! - `settle`   - allocation returns to available (plus/minus P&L) on close
//!
//! Capital is `rust_decimal::Decimal` so the invariant
//! `available + reserved + allocated == ceiling + realized_pnl`
//! holds exactly per strategy. A violation means a reservation/commit bug
//! and halts the affected strategy rather than risk overdraft.
//!
//! Strategies are isolated: a memecoin loss can never consume altcoin
//! capital, because sizing is bounded by the strategy's own account even
//! when the wallet holds more.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::order::StrategyId;
use super::position::PositionId;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient capital for {strategy}: requested {requested}, available {available}")]
    InsufficientCapital {
        strategy: StrategyId,
        requested: Decimal,
        available: Decimal,
    },
    #[error("Unknown reservation {0}")]
    UnknownReservation(Uuid),
    #[error("Unknown allocation for position {0}")]
    UnknownAllocation(PositionId),
    #[error(
        "Ledger invariant violated for {strategy}: available {available} + reserved {reserved} \
         + allocated {allocated} != ceiling {ceiling} + realized {realized}"
    )]
    InvariantViolation {
        strategy: StrategyId,
        available: Decimal,
        reserved: Decimal,
        allocated: Decimal,
        ceiling: Decimal,
        realized: Decimal,
    },
}

/// Proof of reserved capital. Must be either committed or released; dropping
/// one without doing so leaks reserved capital until restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub strategy: StrategyId,
    pub amount: Decimal,
}

/// Per-strategy capital account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalAccount {
    pub ceiling: Decimal,
    pub available: Decimal,
    pub reserved: Decimal,
    pub allocated: Decimal,
    pub realized_pnl: Decimal,
}

impl CapitalAccount {
    fn new(ceiling: Decimal) -> Self {
        Self {
            ceiling,
            available: ceiling,
            reserved: Decimal::ZERO,
            allocated: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    fn check_invariant(&self, strategy: StrategyId) -> Result<(), LedgerError> {
        if self.available + self.reserved + self.allocated != self.ceiling + self.realized_pnl {
            return Err(LedgerError::InvariantViolation {
                strategy,
                available: self.available,
                reserved: self.reserved,
                allocated: self.allocated,
                ceiling: self.ceiling,
                realized: self.realized_pnl,
            });
        }
        Ok(())
    }
}

/// Realized P&L record, kept for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlRecord {
    pub position_id: PositionId,
    pub strategy: StrategyId,
    pub pnl: Decimal,
    pub closed_at: DateTime<Utc>,
}

/// Synchronous ledger core. Wrap in [`SharedLedger`] for concurrent use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    accounts: HashMap<StrategyId, CapitalAccount>,
    #[serde(skip)]
    reservations: HashMap<Uuid, (StrategyId, Decimal)>,
    allocations: HashMap<PositionId, (StrategyId, Decimal)>,
    pnl_history: Vec<PnlRecord>,
}

impl Ledger {
    pub fn new(memecoin_ceiling: Decimal, altcoin_ceiling: Decimal) -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(StrategyId::Memecoin, CapitalAccount::new(memecoin_ceiling));
        accounts.insert(StrategyId::Altcoin, CapitalAccount::new(altcoin_ceiling));
        Self {
            accounts,
            reservations: HashMap::new(),
            allocations: HashMap::new(),
            pnl_history: Vec::new(),
        }
    }

    pub fn account(&self, strategy: StrategyId) -> &CapitalAccount {
        // Both strategies are inserted at construction.
        self.accounts
            .get(&strategy)
            .unwrap_or_else(|| panic!("missing account for {strategy}"))
    }

    fn account_mut(&mut self, strategy: StrategyId) -> &mut CapitalAccount {
        self.accounts
            .get_mut(&strategy)
            .unwrap_or_else(|| panic!("missing account for {strategy}"))
    }

    pub fn available(&self, strategy: StrategyId) -> Decimal {
        self.account(strategy).available
    }

    /// Reserve exactly `amount`, failing if it exceeds available capital.
    pub fn reserve(
        &mut self,
        strategy: StrategyId,
        amount: Decimal,
    ) -> Result<Reservation, LedgerError> {
        let account = self.account_mut(strategy);
        if amount > account.available || amount <= Decimal::ZERO {
            return Err(LedgerError::InsufficientCapital {
                strategy,
                requested: amount,
                available: account.available,
            });
        }
        account.available -= amount;
        account.reserved += amount;
        account.check_invariant(strategy)?;
        let reservation = Reservation {
            id: Uuid::new_v4(),
            strategy,
            amount,
        };
        self.reservations
            .insert(reservation.id, (strategy, amount));
        Ok(reservation)
    }

    /// Reserve `min(requested, available)`, or nothing if below `floor`.
    ///
    /// Sizing and reservation are one operation so two concurrent
    /// opportunities observe a consistent snapshot and can never jointly
    /// overdraw the ceiling.
    pub fn reserve_up_to(
        &mut self,
        strategy: StrategyId,
        requested: Decimal,
        floor: Decimal,
    ) -> Result<Option<Reservation>, LedgerError> {
        let available = self.account(strategy).available;
        let amount = requested.min(available);
        if amount < floor || amount <= Decimal::ZERO {
            return Ok(None);
        }
        self.reserve(strategy, amount).map(Some)
    }

    /// Reservation becomes an allocation tied to a live position.
    pub fn commit(
        &mut self,
        reservation: &Reservation,
        position_id: PositionId,
    ) -> Result<(), LedgerError> {
        let (strategy, amount) = self
            .reservations
            .remove(&reservation.id)
            .ok_or(LedgerError::UnknownReservation(reservation.id))?;
        let account = self.account_mut(strategy);
        account.reserved -= amount;
        account.allocated += amount;
        account.check_invariant(strategy)?;
        self.allocations.insert(position_id, (strategy, amount));
        Ok(())
    }

    /// Rollback: the order failed, expired, or was rejected before fill.
    /// The account is restored exactly as before the reserve.
    pub fn release(&mut self, reservation: &Reservation) -> Result<(), LedgerError> {
        let (strategy, amount) = self
            .reservations
            .remove(&reservation.id)
            .ok_or(LedgerError::UnknownReservation(reservation.id))?;
        let account = self.account_mut(strategy);
        account.reserved -= amount;
        account.available += amount;
        account.check_invariant(strategy)
    }

    /// Exit fill confirmed: allocation returns to available as `proceeds`,
    /// and the difference is posted as realized P&L.
    pub fn settle(
        &mut self,
        position_id: PositionId,
        proceeds: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let (strategy, amount) = self
            .allocations
            .remove(&position_id)
            .ok_or(LedgerError::UnknownAllocation(position_id))?;
        let pnl = proceeds - amount;
        let account = self.account_mut(strategy);
        account.allocated -= amount;
        account.available += proceeds;
        account.realized_pnl += pnl;
        account.check_invariant(strategy)?;
        self.pnl_history.push(PnlRecord {
            position_id,
            strategy,
            pnl,
            closed_at: Utc::now(),
        });
        Ok(pnl)
    }

    pub fn realized_pnl(&self, strategy: StrategyId) -> Decimal {
        self.account(strategy).realized_pnl
    }

    pub fn pnl_history(&self) -> &[PnlRecord] {
        &self.pnl_history
    }

    /// Verify every account's invariant; used after restart recovery.
    pub fn verify(&self) -> Result<(), LedgerError> {
        for (strategy, account) in &self.accounts {
            account.check_invariant(*strategy)?;
        }
        Ok(())
    }

    /// Reservations do not survive a restart; whatever was reserved when
    /// the process died returns to available before loops start.
    pub fn reconcile_after_restart(&mut self) -> Result<(), LedgerError> {
        for account in self.accounts.values_mut() {
            account.available += account.reserved;
            account.reserved = Decimal::ZERO;
        }
        self.reservations.clear();
        self.verify()
    }

}

/// Ledger behind a single async mutex. All sizing decisions and capital
/// transitions run inside the lock, which is exactly what makes each one
/// atomic with respect to concurrent strategy loops.
#[derive(Debug, Clone)]
pub struct SharedLedger {
    inner: Arc<tokio::sync::Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(ledger)),
        }
    }

    pub async fn reserve_up_to(
        &self,
        strategy: StrategyId,
        requested: Decimal,
        floor: Decimal,
    ) -> Result<Option<Reservation>, LedgerError> {
        self.inner
            .lock()
            .await
            .reserve_up_to(strategy, requested, floor)
    }

    pub async fn commit(
        &self,
        reservation: &Reservation,
        position_id: PositionId,
    ) -> Result<(), LedgerError> {
        self.inner.lock().await.commit(reservation, position_id)
    }

    pub async fn release(&self, reservation: &Reservation) -> Result<(), LedgerError> {
        self.inner.lock().await.release(reservation)
    }

    pub async fn settle(
        &self,
        position_id: PositionId,
        proceeds: Decimal,
    ) -> Result<Decimal, LedgerError> {
        self.inner.lock().await.settle(position_id, proceeds)
    }

    pub async fn available(&self, strategy: StrategyId) -> Decimal {
        self.inner.lock().await.available(strategy)
    }

    pub async fn account(&self, strategy: StrategyId) -> CapitalAccount {
        self.inner.lock().await.account(strategy).clone()
    }

    pub async fn realized_pnl(&self, strategy: StrategyId) -> Decimal {
        self.inner.lock().await.realized_pnl(strategy)
    }

    /// Snapshot the whole ledger for persistence or status display.
    pub async fn with_ledger<T>(&self, f: impl FnOnce(&Ledger) -> T) -> T {
        f(&*self.inner.lock().await)
    }
}
