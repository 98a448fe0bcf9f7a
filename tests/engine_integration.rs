//! Trading Engine Integration Tests
//!
//! Exercises the full event-to-position pipeline over scripted ports:
//! 1. ChainMonitor -> Evaluator flow, including duplicate-log suppression
//! 2. Evaluator rejection ladder (cheap gates fire before oracle or router)
//! 3. ExecutionRouter venue fallback and reservation rollback
//! 4. PositionManager exits: profit target, stop loss, forced liquidation
//! 5. Per-strategy capital isolation on the shared ledger
//!
//! All tests are deterministic (no real network calls) and use mock ports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use basehound::domain::{
    BlacklistReason, ChainEvent, ExitReason, Ledger, LedgerError, PositionId, PositionState,
    SharedBlacklist, SharedLedger, StrategyId, TokenAddress,
};
use basehound::execution::{
    ExitParams, ExecutionRouter, LifecycleSettings, NonceError, RouterSettings, TradeLifecycle,
    WalletChain,
};
use basehound::monitor::{ChainMonitor, MonitorSettings};
use basehound::ports::mocks::{
    MockChainFeed, MockDexAdapter, MockIndicatorSource, MockSecurityOracle, RecordingNotifier,
};
use basehound::ports::{DexAdapter, FeedEvent, NotifierEvent, SecurityOracle};
use basehound::position::{ManagerSettings, PositionManager, SharedPositionBook};
use basehound::scorer::{RiskScorer, ScorerSettings};
use basehound::strategy::{Evaluator, EvaluatorSettings, Rejection, SwingEntryRule, Verdict};

// ============================================================================
// Fixtures
// ============================================================================

struct FakeChain;

#[async_trait]
impl WalletChain for FakeChain {
    async fn pending_nonce(&self) -> Result<u64, NonceError> {
        Ok(7)
    }

    async fn gas_price_gwei(&self) -> Result<u64, NonceError> {
        Ok(10)
    }

    async fn wallet_balance_eth(&self) -> Result<f64, NonceError> {
        Ok(0.5)
    }
}

fn token(n: u8) -> TokenAddress {
    TokenAddress::new(&format!("0x{:040x}", n)).unwrap()
}

fn pair_created(n: u8, block: u64, liquidity_eth: f64) -> FeedEvent {
    FeedEvent::PairCreated {
        token: token(n),
        pair_address: token(n.wrapping_add(100)),
        liquidity_eth,
        tx_hash: format!("0xtx{n}"),
        log_index: 3,
        block_number: block,
    }
}

fn launch(n: u8, liquidity_eth: f64) -> ChainEvent {
    ChainEvent::Launch(basehound::domain::LaunchEvent {
        token: token(n),
        pair_address: token(n.wrapping_add(100)),
        liquidity_eth,
        tx_hash: format!("0xtx{n}"),
        log_index: 3,
        detected_at: chrono::Utc::now(),
    })
}

fn evaluator_settings() -> EvaluatorSettings {
    EvaluatorSettings {
        meme_max_investment: dec!(8),
        meme_min_liquidity_eth: 0.01,
        meme_min_holders: 50,
        meme_cooldown: Duration::from_secs(30),
        alt_max_investment: dec!(100),
        swing_rule: SwingEntryRule {
            rsi_entry_max: 35.0,
            min_volume_change_pct: 20.0,
        },
        min_order_usd: dec!(1),
        max_risk_score: 0.7,
        slippage_tolerance: 0.05,
        max_gas_price_gwei: 50,
        order_ttl_secs: 60,
    }
}

/// The full downstream pipeline behind the monitor: evaluator, router,
/// lifecycle, and manager sharing one ledger, book, and blacklist.
struct Pipeline {
    evaluator: Evaluator,
    lifecycle: Arc<TradeLifecycle>,
    manager: PositionManager,
    ledger: SharedLedger,
    book: SharedPositionBook,
    blacklist: SharedBlacklist,
    notifier: RecordingNotifier,
    oracle: MockSecurityOracle,
    venues: Vec<Arc<MockDexAdapter>>,
}

impl Pipeline {
    fn new(oracle: MockSecurityOracle, venues: Vec<MockDexAdapter>) -> Self {
        let venues: Vec<Arc<MockDexAdapter>> = venues.into_iter().map(Arc::new).collect();
        let adapters: Vec<Arc<dyn DexAdapter>> = venues
            .iter()
            .map(|v| v.clone() as Arc<dyn DexAdapter>)
            .collect();
        let ledger = SharedLedger::new(Ledger::new(dec!(80), dec!(500)));
        let book = SharedPositionBook::new();
        let blacklist = SharedBlacklist::default();
        let notifier = RecordingNotifier::new();
        let oracle_arc: Arc<dyn SecurityOracle> = Arc::new(oracle.clone());

        let scorer = Arc::new(RiskScorer::new(
            oracle_arc.clone(),
            blacklist.clone(),
            ScorerSettings {
                min_liquidity_eth: 0.01,
                min_holders: 50,
                check_timeout: Duration::from_millis(200),
                assessment_ttl: Duration::from_secs(60),
            },
        ));
        let evaluator = Evaluator::new(
            scorer,
            oracle_arc,
            ledger.clone(),
            blacklist.clone(),
            book.clone(),
            evaluator_settings(),
        );

        let router = Arc::new(ExecutionRouter::new(
            adapters,
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
            Arc::new(notifier.clone()),
            LifecycleSettings {
                memecoin_exits: ExitParams {
                    profit_target: 2.0,
                    stop_loss: 0.7,
                },
                altcoin_exits: ExitParams {
                    profit_target: 1.15,
                    stop_loss: 0.92,
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
                poll_interval: Duration::from_secs(30),
                meme_max_hold_hours: 24.0,
                alt_max_hold_hours: 72.0,
                rebalance_interval: Duration::from_secs(3600),
                max_position_weight_pct: 40.0,
            },
        );

        Self {
            evaluator,
            lifecycle,
            manager,
            ledger,
            book,
            blacklist,
            notifier,
            oracle,
            venues,
        }
    }

    /// Evaluate an event and, if accepted, drive the buy to completion.
    async fn ingest(&self, event: &ChainEvent) -> Result<Option<PositionId>, LedgerError> {
        match self.evaluator.evaluate(event).await? {
            Verdict::Accept(sized) => Ok(self.lifecycle.open(sized).await.ok()),
            Verdict::Reject(_) => Ok(None),
        }
    }

    async fn position_state(&self, id: PositionId) -> PositionState {
        self.book
            .with_book(|book| book.get(&id).map(|p| p.state))
            .await
            .unwrap()
    }
}

fn clean_venue(name: &str) -> MockDexAdapter {
    MockDexAdapter::new(name)
        .with_quote(1.0, 8.0, 30)
        .with_swap_ok("0xbuy")
        .with_swap_ok("0xsell")
}

// ============================================================================
// Launch -> open position
// ============================================================================

#[tokio::test]
async fn test_clean_launch_opens_a_position() {
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![clean_venue("baseswap")],
    );

    let id = pipeline.ingest(&launch(1, 0.5)).await.unwrap().unwrap();

    assert_eq!(pipeline.position_state(id).await, PositionState::Open);
    let account = pipeline.ledger.account(StrategyId::Memecoin).await;
    assert_eq!(account.allocated, dec!(8));
    assert_eq!(account.available, dec!(72));
    assert_eq!(account.reserved, Decimal::ZERO);

    let opened = pipeline
        .notifier
        .events()
        .iter()
        .any(|e| matches!(e, NotifierEvent::PositionOpened { .. }));
    assert!(opened, "expected a PositionOpened notification");
}

#[tokio::test]
async fn test_duplicate_launch_log_produces_one_order() {
    // The poller can observe the same PairCreated log twice across
    // overlapping ranges; only one order may reach the router.
    let feed = Arc::new(
        MockChainFeed::new()
            .with_subscription(vec![
                pair_created(1, 100, 0.5),
                pair_created(1, 100, 0.5),
            ])
            .with_latest_block(100),
    );
    let (tx, mut rx) = mpsc::channel(16);
    let monitor = ChainMonitor::new(
        feed,
        Arc::new(MockIndicatorSource::new()),
        tx,
        MonitorSettings {
            replay_lookback_blocks: 120,
            max_reconnect_attempts: 5,
            dedup_window: 64,
            watchlist: Vec::new(),
        },
    );
    let monitor_task = tokio::spawn(monitor.run());

    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![clean_venue("baseswap")],
    );

    let mut launches = 0;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(300), rx.recv()).await
    {
        launches += 1;
        pipeline.ingest(&event).await.unwrap();
    }
    monitor_task.abort();

    assert_eq!(launches, 1, "duplicate log must be dropped by the monitor");
    assert_eq!(pipeline.book.snapshot().await.len(), 1);
    assert_eq!(
        pipeline.ledger.account(StrategyId::Memecoin).await.allocated,
        dec!(8)
    );
}

// ============================================================================
// Rejection ladder ordering
// ============================================================================

#[tokio::test]
async fn test_thin_pool_never_reaches_oracle_or_router() {
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear(),
        vec![clean_venue("baseswap")],
    );

    let verdict = pipeline.evaluator.evaluate(&launch(1, 0.005)).await.unwrap();
    assert!(matches!(
        verdict,
        Verdict::Reject(Rejection::LiquidityBelowMin { .. })
    ));
    assert_eq!(pipeline.oracle.honeypot_call_count(), 0);
    assert!(pipeline.venues[0].quote_calls().is_empty());
    assert_eq!(
        pipeline.ledger.account(StrategyId::Memecoin).await.available,
        dec!(80)
    );
}

// ============================================================================
// Router fallback and rollback
// ============================================================================

#[tokio::test]
async fn test_entry_falls_back_to_third_venue() {
    // Venues are ranked by net output; the best two revert, the third fills.
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![
            MockDexAdapter::new("uniswap_v3")
                .with_quote(1.0, 8.2, 30)
                .with_swap_revert("insufficient output"),
            MockDexAdapter::new("baseswap")
                .with_quote(1.0, 8.1, 25)
                .with_swap_revert("insufficient output"),
            MockDexAdapter::new("camelot")
                .with_quote(1.0, 8.0, 30)
                .with_swap_ok("0xfill"),
        ],
    );

    let id = pipeline.ingest(&launch(1, 0.5)).await.unwrap().unwrap();

    assert_eq!(pipeline.position_state(id).await, PositionState::Open);
    assert_eq!(pipeline.venues[0].swap_calls().len(), 1);
    assert_eq!(pipeline.venues[1].swap_calls().len(), 1);
    assert_eq!(pipeline.venues[2].swap_calls().len(), 1);
}

#[tokio::test]
async fn test_exhausted_routes_release_the_reservation() {
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![
            MockDexAdapter::new("uniswap_v3")
                .with_quote(1.0, 8.0, 30)
                .with_swap_revert("insufficient output"),
            MockDexAdapter::new("baseswap")
                .with_quote(1.0, 7.9, 25)
                .with_swap_revert("insufficient output"),
        ],
    );

    let opened = pipeline.ingest(&launch(1, 0.5)).await.unwrap();
    assert!(opened.is_none());

    let account = pipeline.ledger.account(StrategyId::Memecoin).await;
    assert_eq!(account.available, dec!(80));
    assert_eq!(account.allocated, Decimal::ZERO);
    assert_eq!(account.reserved, Decimal::ZERO);

    let positions = pipeline.book.snapshot().await;
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].state, PositionState::Failed);
    let failed = pipeline
        .notifier
        .events()
        .iter()
        .any(|e| matches!(e, NotifierEvent::OrderFailed { .. }));
    assert!(failed, "expected an OrderFailed notification");
}

// ============================================================================
// Managed exits
// ============================================================================

#[tokio::test]
async fn test_profit_target_exit_settles_gains() {
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![clean_venue("baseswap")],
    );
    let id = pipeline.ingest(&launch(1, 0.5)).await.unwrap().unwrap();

    // Entry at 1.00 with a 2.0x target; the next mark at 2.00 must close.
    pipeline.venues[0].set_quote(2.0, 8.0, 30);
    pipeline.manager.poll_cycle().await;

    assert_eq!(pipeline.position_state(id).await, PositionState::Closed);
    let account = pipeline.ledger.account(StrategyId::Memecoin).await;
    assert_eq!(account.realized_pnl, dec!(8));
    assert_eq!(account.available, dec!(88));
    assert_eq!(account.allocated, Decimal::ZERO);

    let closed = pipeline.notifier.events().iter().any(|e| {
        matches!(
            e,
            NotifierEvent::PositionClosed {
                reason: ExitReason::ProfitTarget,
                ..
            }
        )
    });
    assert!(closed, "expected a ProfitTarget close notification");
}

#[tokio::test]
async fn test_stop_loss_exit_settles_losses() {
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![clean_venue("baseswap")],
    );
    let id = pipeline.ingest(&launch(1, 0.5)).await.unwrap().unwrap();

    // Entry 1.00, stop at 0.70; a mark of 0.50 forces the exit.
    pipeline.venues[0].set_quote(0.5, 8.0, 30);
    pipeline.manager.poll_cycle().await;

    assert_eq!(pipeline.position_state(id).await, PositionState::Closed);
    let account = pipeline.ledger.account(StrategyId::Memecoin).await;
    assert_eq!(account.realized_pnl, dec!(-4));
    assert_eq!(account.available, dec!(76));
}

#[tokio::test]
async fn test_blacklisted_holding_is_liquidated() {
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![clean_venue("baseswap")],
    );
    let id = pipeline.ingest(&launch(1, 0.5)).await.unwrap().unwrap();

    // Post-entry discovery: the token turns out to be a honeypot.
    pipeline
        .blacklist
        .add(token(1), BlacklistReason::Honeypot)
        .await;
    pipeline.manager.poll_cycle().await;

    assert_eq!(pipeline.position_state(id).await, PositionState::Closed);
    let closed = pipeline.notifier.events().iter().any(|e| {
        matches!(
            e,
            NotifierEvent::PositionClosed {
                reason: ExitReason::Liquidation,
                ..
            }
        )
    });
    assert!(closed, "expected a Liquidation close notification");
}

#[tokio::test]
async fn test_failed_liquidation_is_retried_next_cycle() {
    // The first sell attempt reverts; the position must stay in
    // Liquidating and close on the following cycle.
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![MockDexAdapter::new("baseswap")
            .with_quote(1.0, 8.0, 30)
            .with_swap_ok("0xbuy")
            .with_swap_revert("transfer failed")
            .with_swap_ok("0xsell")],
    );
    let id = pipeline.ingest(&launch(1, 0.5)).await.unwrap().unwrap();
    pipeline
        .blacklist
        .add(token(1), BlacklistReason::RugPull)
        .await;

    pipeline.manager.poll_cycle().await;
    assert_eq!(pipeline.position_state(id).await, PositionState::Liquidating);

    pipeline.manager.poll_cycle().await;
    assert_eq!(pipeline.position_state(id).await, PositionState::Closed);
}

// ============================================================================
// Capital isolation
// ============================================================================

#[tokio::test]
async fn test_memecoin_entry_never_touches_altcoin_capital() {
    let pipeline = Pipeline::new(
        MockSecurityOracle::clear().with_holder_count(300),
        vec![clean_venue("baseswap")],
    );
    pipeline.ingest(&launch(1, 0.5)).await.unwrap().unwrap();

    let alt = pipeline.ledger.account(StrategyId::Altcoin).await;
    assert_eq!(alt.ceiling, dec!(500));
    assert_eq!(alt.available, dec!(500));
    assert_eq!(alt.allocated, Decimal::ZERO);

    pipeline
        .ledger
        .with_ledger(|ledger| ledger.verify())
        .await
        .unwrap();
}
