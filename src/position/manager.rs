//! Position Manager
//!
//! Fixed-interval polling loop over the live book. Each cycle re-prices
//! every open position against the best available sell quote and fires the
//! first matching exit trigger: blacklist liquidation, profit target, stop
//! loss, then the strategy's time stop. The altcoin book additionally gets
//! a periodic rebalance pass that closes overweight positions.
//!
//! Exits that exhaust all routes leave the position tracked (back in
//! `Open`, or still `Liquidating`) and are retried next cycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::{ExitReason, Position, PositionState, SharedBlacklist, Side, StrategyId};
use crate::execution::{ExecutionRouter, TradeLifecycle};

use super::book::SharedPositionBook;

pub struct ManagerSettings {
    pub poll_interval: Duration,
    pub meme_max_hold_hours: f64,
    pub alt_max_hold_hours: f64,
    pub rebalance_interval: Duration,
    pub max_position_weight_pct: f64,
}

pub struct PositionManager {
    book: SharedPositionBook,
    blacklist: SharedBlacklist,
    lifecycle: Arc<TradeLifecycle>,
    router: Arc<ExecutionRouter>,
    settings: ManagerSettings,
    peak_book_value: std::sync::Mutex<f64>,
}

impl PositionManager {
    pub fn new(
        book: SharedPositionBook,
        blacklist: SharedBlacklist,
        lifecycle: Arc<TradeLifecycle>,
        router: Arc<ExecutionRouter>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            book,
            blacklist,
            lifecycle,
            router,
            settings,
            peak_book_value: std::sync::Mutex::new(0.0),
        }
    }

    /// Run the polling loop until the task is aborted.
    pub async fn run(self: Arc<Self>) {
        let mut tick = tokio::time::interval(self.settings.poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_rebalance = tokio::time::Instant::now();
        loop {
            tick.tick().await;
            self.poll_cycle().await;
            if last_rebalance.elapsed() >= self.settings.rebalance_interval {
                self.rebalance().await;
                last_rebalance = tokio::time::Instant::now();
            }
        }
    }

    /// One re-pricing pass over the live book.
    pub async fn poll_cycle(&self) {
        for position in self.book.live().await {
            let result = match position.state {
                // Entry still in flight.
                PositionState::Opening => continue,
                PositionState::Liquidating => {
                    self.lifecycle.close(position.id, ExitReason::Liquidation).await
                }
                PositionState::Open => {
                    let Some(reason) = self.exit_trigger(&position).await else {
                        continue;
                    };
                    info!(
                        position_id = %position.id,
                        token = %position.token.address,
                        ?reason,
                        "exit triggered"
                    );
                    self.lifecycle.close(position.id, reason).await
                }
                // Closing is transient within close(); Closed/Failed are
                // not live.
                _ => continue,
            };
            if let Err(err) = result {
                warn!(position_id = %position.id, %err, "exit attempt errored");
            }
        }
    }

    async fn exit_trigger(&self, position: &Position) -> Option<ExitReason> {
        if self.blacklist.contains(&position.token.address).await {
            return Some(ExitReason::Liquidation);
        }

        let max_hold = match position.strategy {
            StrategyId::Memecoin => self.settings.meme_max_hold_hours,
            StrategyId::Altcoin => self.settings.alt_max_hold_hours,
        };
        if position.age_hours() >= max_hold {
            return Some(ExitReason::MaxHold);
        }

        let Some(price) = self.mark_price(position).await else {
            debug!(position_id = %position.id, "no quote this cycle, holding");
            return None;
        };
        if price >= position.profit_target_price {
            return Some(ExitReason::ProfitTarget);
        }
        if price <= position.stop_loss_price {
            return Some(ExitReason::StopLoss);
        }
        None
    }

    async fn mark_price(&self, position: &Position) -> Option<f64> {
        self.router
            .best_quote(&position.token.address, Side::Sell, position.quantity)
            .await
            .map(|quote| quote.price_usd)
    }

    /// Revalue the altcoin book, track peak/drawdown, and close positions
    /// whose weight exceeds the per-position cap.
    pub async fn rebalance(&self) {
        let positions = self
            .book
            .with_book(|b| b.live_for_strategy(StrategyId::Altcoin))
            .await;
        let open: Vec<&Position> = positions
            .iter()
            .filter(|p| p.state == PositionState::Open)
            .collect();
        if open.is_empty() {
            return;
        }

        let mut values = Vec::with_capacity(open.len());
        let mut total = 0.0;
        for position in &open {
            let price = match self.mark_price(position).await {
                Some(price) => price,
                None => position.entry_price,
            };
            let value = position.quantity * price;
            values.push((position.id, value));
            total += value;
        }
        if total <= 0.0 {
            return;
        }

        let drawdown_pct = {
            let mut peak = self
                .peak_book_value
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if total > *peak {
                *peak = total;
            }
            (*peak - total) / *peak * 100.0
        };
        info!(
            book_value = total,
            drawdown_pct,
            positions = open.len(),
            "altcoin rebalance pass"
        );

        for (id, value) in values {
            let weight_pct = value / total * 100.0;
            if weight_pct > self.settings.max_position_weight_pct {
                info!(position_id = %id, weight_pct, "closing overweight position");
                if let Err(err) = self.lifecycle.close(id, ExitReason::Rebalance).await {
                    warn!(position_id = %id, %err, "rebalance close errored");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BlacklistReason, Ledger, SharedLedger, Token, TokenAddress, TradeOrder,
    };
    use crate::execution::nonce::{NonceError, WalletChain};
    use crate::execution::{ExitParams, LifecycleSettings, RouterSettings};
    use crate::ports::mocks::{MockDexAdapter, RecordingNotifier};
    use crate::ports::DexAdapter;
    use crate::strategy::SizedOrder;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    struct FakeChain;

    #[async_trait]
    impl WalletChain for FakeChain {
        async fn pending_nonce(&self) -> Result<u64, NonceError> {
            Ok(0)
        }

        async fn gas_price_gwei(&self) -> Result<u64, NonceError> {
            Ok(10)
        }

        async fn wallet_balance_eth(&self) -> Result<f64, NonceError> {
            Ok(0.5)
        }
    }

    fn token(n: u8) -> Token {
        Token::unnamed(TokenAddress::new(&format!("0x{:040x}", n)).unwrap())
    }

    struct Fixture {
        manager: PositionManager,
        lifecycle: Arc<TradeLifecycle>,
        ledger: SharedLedger,
        book: SharedPositionBook,
        blacklist: SharedBlacklist,
        adapter: Arc<MockDexAdapter>,
    }

    fn fixture(adapter: MockDexAdapter) -> Fixture {
        let adapter = Arc::new(adapter);
        let ledger = SharedLedger::new(Ledger::new(dec!(80), dec!(500)));
        let book = SharedPositionBook::new();
        let blacklist = SharedBlacklist::default();
        let router = Arc::new(ExecutionRouter::new(
            vec![adapter.clone() as Arc<dyn DexAdapter>],
            Arc::new(FakeChain),
            RouterSettings {
                slippage_tolerance: 0.05,
                max_gas_price_gwei: 50,
                max_nonce_retries: 3,
            },
        ));
        let lifecycle = Arc::new(TradeLifecycle::new(
            router.clone(),
            ledger.clone(),
            book.clone(),
            Arc::new(RecordingNotifier::new()),
            LifecycleSettings {
                memecoin_exits: ExitParams {
                    profit_target: 2.0,
                    stop_loss: 0.7,
                },
                altcoin_exits: ExitParams {
                    profit_target: 1.5,
                    stop_loss: 0.85,
                },
                slippage_tolerance: 0.05,
                max_gas_price_gwei: 50,
                sell_ttl_secs: 60,
            },
        ));
        let manager = PositionManager::new(
            book.clone(),
            blacklist.clone(),
            lifecycle.clone(),
            router,
            ManagerSettings {
                poll_interval: Duration::from_secs(10),
                meme_max_hold_hours: 24.0,
                alt_max_hold_hours: 168.0,
                rebalance_interval: Duration::from_secs(24 * 3600),
                max_position_weight_pct: 40.0,
            },
        );
        Fixture {
            manager,
            lifecycle,
            ledger,
            book,
            blacklist,
            adapter,
        }
    }

    /// Open a memecoin position at entry price 1.00 with $8 notional.
    async fn open_position(f: &Fixture, n: u8) -> crate::domain::PositionId {
        let reservation = f
            .ledger
            .reserve_up_to(StrategyId::Memecoin, dec!(8), dec!(1))
            .await
            .unwrap()
            .unwrap();
        let order = TradeOrder::buy(
            token(n),
            reservation.amount,
            0.05,
            50,
            StrategyId::Memecoin,
            60,
        );
        f.lifecycle
            .open(SizedOrder { order, reservation })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_profit_target_closes_at_double() {
        let f = fixture(
            MockDexAdapter::new("venue")
                .with_quote(1.0, 8.0, 0)
                .with_swap_ok("0xentry")
                .with_swap_ok("0xexit"),
        );
        let pid = open_position(&f, 1).await;
        // Below target: nothing happens.
        f.adapter.set_quote(1.99, 15.9, 0);
        f.manager.poll_cycle().await;
        assert_eq!(
            f.book.with_book(|b| b.get(&pid).unwrap().state).await,
            PositionState::Open
        );
        // At exactly 2.00 the target fires.
        f.adapter.set_quote(2.0, 16.0, 0);
        f.manager.poll_cycle().await;
        let position = f.book.with_book(|b| b.get(&pid).cloned()).await.unwrap();
        assert_eq!(position.state, PositionState::Closed);
        assert_eq!(position.exit_reason, Some(ExitReason::ProfitTarget));
    }

    #[tokio::test]
    async fn test_stop_loss_closes_at_seventy_percent() {
        let f = fixture(
            MockDexAdapter::new("venue")
                .with_quote(1.0, 8.0, 0)
                .with_swap_ok("0xentry")
                .with_swap_ok("0xexit"),
        );
        let pid = open_position(&f, 1).await;
        f.adapter.set_quote(0.70, 5.6, 0);
        f.manager.poll_cycle().await;
        let position = f.book.with_book(|b| b.get(&pid).cloned()).await.unwrap();
        assert_eq!(position.state, PositionState::Closed);
        assert_eq!(position.exit_reason, Some(ExitReason::StopLoss));
        // Loss realized: 8 * 0.7 came back.
        let account = f.ledger.account(StrategyId::Memecoin).await;
        assert_eq!(account.realized_pnl, dec!(-2.4));
    }

    #[tokio::test]
    async fn test_blacklisted_position_liquidated() {
        let f = fixture(
            MockDexAdapter::new("venue")
                .with_quote(1.0, 8.0, 0)
                .with_swap_ok("0xentry")
                .with_swap_ok("0xexit"),
        );
        let pid = open_position(&f, 1).await;
        f.blacklist
            .add(token(1).address, BlacklistReason::Honeypot)
            .await;
        f.manager.poll_cycle().await;
        let position = f.book.with_book(|b| b.get(&pid).cloned()).await.unwrap();
        assert_eq!(position.state, PositionState::Closed);
        assert_eq!(position.exit_reason, Some(ExitReason::Liquidation));
    }

    #[tokio::test]
    async fn test_max_hold_time_stop() {
        let f = fixture(
            MockDexAdapter::new("venue")
                .with_quote(1.0, 8.0, 0)
                .with_swap_ok("0xentry")
                .with_swap_ok("0xexit"),
        );
        let pid = open_position(&f, 1).await;
        f.book
            .with_book_mut(|b| {
                b.get_mut(&pid).unwrap().opened_at =
                    chrono::Utc::now() - ChronoDuration::hours(25);
            })
            .await;
        f.manager.poll_cycle().await;
        let position = f.book.with_book(|b| b.get(&pid).cloned()).await.unwrap();
        assert_eq!(position.state, PositionState::Closed);
        assert_eq!(position.exit_reason, Some(ExitReason::MaxHold));
    }

    #[tokio::test]
    async fn test_failed_liquidation_retried_next_cycle() {
        let f = fixture(
            MockDexAdapter::new("venue")
                .with_quote(1.0, 8.0, 0)
                .with_swap_ok("0xentry")
                .with_swap_revert("sell blocked")
                .with_swap_ok("0xexit"),
        );
        let pid = open_position(&f, 1).await;
        f.blacklist
            .add(token(1).address, BlacklistReason::Honeypot)
            .await;
        f.manager.poll_cycle().await;
        // First sell reverted: still tracked, still liquidating.
        assert_eq!(
            f.book.with_book(|b| b.get(&pid).unwrap().state).await,
            PositionState::Liquidating
        );
        f.manager.poll_cycle().await;
        assert_eq!(
            f.book.with_book(|b| b.get(&pid).unwrap().state).await,
            PositionState::Closed
        );
    }

    #[tokio::test]
    async fn test_rebalance_closes_overweight_position() {
        let f = fixture(
            MockDexAdapter::new("venue")
                .with_quote(1.0, 100.0, 0)
                .with_swap_ok("0xentry1")
                .with_swap_ok("0xentry2")
                .with_swap_ok("0xexit"),
        );
        // Two altcoin positions, one at $100 and one at $25 quantity-wise.
        let r1 = f
            .ledger
            .reserve_up_to(StrategyId::Altcoin, dec!(100), dec!(1))
            .await
            .unwrap()
            .unwrap();
        let o1 = TradeOrder::buy(token(2), r1.amount, 0.05, 50, StrategyId::Altcoin, 60);
        let big = f
            .lifecycle
            .open(SizedOrder {
                order: o1,
                reservation: r1,
            })
            .await
            .unwrap();

        f.adapter.set_quote(1.0, 25.0, 0);
        let r2 = f
            .ledger
            .reserve_up_to(StrategyId::Altcoin, dec!(25), dec!(1))
            .await
            .unwrap()
            .unwrap();
        let o2 = TradeOrder::buy(token(3), r2.amount, 0.05, 50, StrategyId::Altcoin, 60);
        let small = f
            .lifecycle
            .open(SizedOrder {
                order: o2,
                reservation: r2,
            })
            .await
            .unwrap();

        // 100/125 = 80% > 40% cap for the big one; 25/125 = 20% stays.
        f.manager.rebalance().await;
        assert_eq!(
            f.book.with_book(|b| b.get(&big).unwrap().state).await,
            PositionState::Closed
        );
        assert_eq!(
            f.book
                .with_book(|b| b.get(&big).unwrap().exit_reason)
                .await,
            Some(ExitReason::Rebalance)
        );
        assert_eq!(
            f.book.with_book(|b| b.get(&small).unwrap().state).await,
            PositionState::Open
        );
    }
}
