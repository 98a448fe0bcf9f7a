//! Trading engine orchestrator
//!
//! Wires the monitor, evaluator, lifecycle and position manager together
//! and owns the task lifecycle: one monitor task, one event loop, one
//! position-manager loop, one autosave loop. Strategies are isolated
//! end-to-end; a halted memecoin strategy never touches the altcoin loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::{
    Blacklist, BlacklistReason, CapitalAccount, ChainEvent, Ledger, Position, Side,
    SharedBlacklist, SharedLedger, StrategyId, Token, TokenAddress,
};
use crate::execution::{
    ExecutionRouter, ExitParams, LifecycleSettings, RouterSettings, TradeLifecycle, WalletChain,
};
use crate::monitor::{ChainMonitor, MonitorError, MonitorSettings};
use crate::persistence::{EngineState, PersistError, RecoveryStatus};
use crate::ports::{
    ChainFeed, DexAdapter, IndicatorSource, Notifier, NotifierEvent, SecurityOracle,
};
use crate::position::{ManagerSettings, PositionManager, SharedPositionBook};
use crate::scorer::{RiskScorer, ScorerSettings};
use crate::strategy::{Evaluator, EvaluatorSettings, SizedOrder, Verdict};

/// State snapshot cadence between event-driven saves.
const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Connectivity(#[from] MonitorError),

    #[error("State file is corrupted: {0}")]
    CorruptState(String),

    #[error(transparent)]
    Persistence(#[from] PersistError),

    #[error("Recovered state is inconsistent: {0}")]
    Recovery(#[from] crate::domain::LedgerError),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Strategy {0} is not running")]
    StrategyNotRunning(StrategyId),

    #[error("Insufficient {0} capital for a manual order")]
    InsufficientCapital(StrategyId),

    #[error("No live position in {0}")]
    NoPosition(TokenAddress),

    #[error("Order failed: {0}")]
    OrderFailed(String),
}

/// Per-strategy run state. `running` goes false only on a fatal condition
/// for that strategy; `paused` is the operator toggle.
#[derive(Debug)]
pub struct StrategyHandle {
    running: AtomicBool,
    paused: AtomicBool,
}

impl StrategyHandle {
    fn new(enabled: bool) -> Self {
        Self {
            running: AtomicBool::new(enabled),
            paused: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.paused.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }
}

/// Status snapshot returned by [`Orchestrator::status`].
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub memecoin_running: bool,
    pub memecoin_paused: bool,
    pub altcoin_running: bool,
    pub altcoin_paused: bool,
    pub memecoin_account: CapitalAccount,
    pub altcoin_account: CapitalAccount,
    pub open_positions: usize,
    pub blacklisted_tokens: usize,
}

/// Owns every engine component and the tasks that drive them.
pub struct Orchestrator {
    config: Config,
    feed: Arc<dyn ChainFeed>,
    indicators: Arc<dyn IndicatorSource>,
    notifier: Arc<dyn Notifier>,
    ledger: SharedLedger,
    book: SharedPositionBook,
    blacklist: SharedBlacklist,
    evaluator: Arc<Evaluator>,
    lifecycle: Arc<TradeLifecycle>,
    manager: Arc<PositionManager>,
    handles: HashMap<StrategyId, StrategyHandle>,
    chain: Arc<dyn WalletChain>,
    state_path: PathBuf,
    shutdown: Notify,
    stopping: AtomicBool,
    gas_alarmed: AtomicBool,
}

impl Orchestrator {
    /// Build the engine, recovering persisted state first. In-flight work
    /// from a previous run is reconciled: reservations return to available
    /// and half-open positions resolve to `Failed`/`Open`.
    #[allow(clippy::too_many_arguments)]
    pub async fn bootstrap(
        config: Config,
        feed: Arc<dyn ChainFeed>,
        indicators: Arc<dyn IndicatorSource>,
        oracle: Arc<dyn SecurityOracle>,
        venues: Vec<Arc<dyn DexAdapter>>,
        chain: Arc<dyn WalletChain>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, OrchestratorError> {
        let state_path = PathBuf::from(config.chain.expanded_state_file());
        let (ledger, positions, blacklist) = match EngineState::load(&state_path) {
            RecoveryStatus::Fresh => {
                info!(path = %state_path.display(), "No prior state, starting fresh");
                (
                    Ledger::new(
                        decimal(config.ledger.memecoin_ceiling_usd),
                        decimal(config.ledger.altcoin_ceiling_usd),
                    ),
                    Vec::new(),
                    Blacklist::new(),
                )
            }
            RecoveryStatus::Recovered(mut state) => {
                state.normalize()?;
                let live = state.positions.iter().filter(|p| p.is_live()).count();
                info!(
                    positions = live,
                    blacklisted = state.blacklist.len(),
                    "Recovered engine state"
                );
                let blacklist = state.blacklist_set();
                (state.ledger, state.positions, blacklist)
            }
            RecoveryStatus::Corrupted(reason) => {
                // Refusing to trade on unknown capital state beats guessing.
                return Err(OrchestratorError::CorruptState(reason));
            }
        };

        let ledger = SharedLedger::new(ledger);
        let book = SharedPositionBook::new();
        for position in positions.into_iter().filter(Position::is_live) {
            book.insert(position).await;
        }
        let blacklist = SharedBlacklist::new(blacklist);

        let scorer = Arc::new(RiskScorer::new(
            Arc::clone(&oracle),
            blacklist.clone(),
            ScorerSettings {
                min_liquidity_eth: config.memecoin.min_liquidity_eth,
                min_holders: config.memecoin.min_holders,
                check_timeout: Duration::from_secs(config.risk.check_timeout_secs),
                assessment_ttl: Duration::from_secs(config.risk.risk_ttl_secs),
            },
        ));
        let evaluator = Arc::new(Evaluator::new(
            scorer,
            oracle,
            ledger.clone(),
            blacklist.clone(),
            book.clone(),
            EvaluatorSettings::from_config(&config),
        ));
        let router = Arc::new(ExecutionRouter::new(
            venues,
            Arc::clone(&chain),
            RouterSettings {
                slippage_tolerance: config.execution.slippage_tolerance,
                max_gas_price_gwei: config.execution.max_gas_price_gwei,
                max_nonce_retries: config.execution.max_nonce_retries,
            },
        ));
        let lifecycle = Arc::new(TradeLifecycle::new(
            Arc::clone(&router),
            ledger.clone(),
            book.clone(),
            Arc::clone(&notifier),
            LifecycleSettings {
                memecoin_exits: ExitParams {
                    profit_target: config.memecoin.profit_target,
                    stop_loss: config.memecoin.stop_loss,
                },
                altcoin_exits: ExitParams {
                    profit_target: config.altcoin.profit_target,
                    stop_loss: config.altcoin.stop_loss,
                },
                slippage_tolerance: config.execution.slippage_tolerance,
                max_gas_price_gwei: config.execution.max_gas_price_gwei,
                sell_ttl_secs: config.execution.order_ttl_secs as i64,
            },
        ));
        let manager = Arc::new(PositionManager::new(
            book.clone(),
            blacklist.clone(),
            Arc::clone(&lifecycle),
            router,
            ManagerSettings {
                poll_interval: Duration::from_secs(config.position.poll_secs),
                meme_max_hold_hours: config.memecoin.max_hold_hours as f64,
                alt_max_hold_hours: config.altcoin.max_hold_hours as f64,
                rebalance_interval: Duration::from_secs(config.altcoin.rebalance_hours * 3600),
                max_position_weight_pct: config.altcoin.max_position_weight_pct,
            },
        ));

        let mut handles = HashMap::new();
        handles.insert(
            StrategyId::Memecoin,
            StrategyHandle::new(config.memecoin.enabled),
        );
        handles.insert(
            StrategyId::Altcoin,
            StrategyHandle::new(config.altcoin.enabled),
        );

        Ok(Self {
            config,
            feed,
            indicators,
            notifier,
            ledger,
            book,
            blacklist,
            evaluator,
            lifecycle,
            manager,
            handles,
            chain,
            state_path,
            shutdown: Notify::new(),
            stopping: AtomicBool::new(false),
            gas_alarmed: AtomicBool::new(false),
        })
    }

    /// Run until shutdown is requested or chain connectivity is lost.
    pub async fn run(self: Arc<Self>) -> Result<(), OrchestratorError> {
        info!(
            chain_id = self.config.chain.chain_id,
            wallet = %self.config.chain.wallet_address,
            "Starting trading engine"
        );
        self.send_notification(NotifierEvent::EngineStarted);

        let (events_tx, events_rx) = mpsc::channel::<ChainEvent>(256);
        let monitor = ChainMonitor::new(
            Arc::clone(&self.feed),
            Arc::clone(&self.indicators),
            events_tx,
            self.monitor_settings(),
        );
        let mut monitor_task = tokio::spawn(monitor.run());
        let event_task = tokio::spawn(Arc::clone(&self).event_loop(events_rx));
        let manager_task = tokio::spawn(Arc::clone(&self.manager).run());
        let autosave_task = tokio::spawn(Arc::clone(&self).autosave_loop());

        let result = tokio::select! {
            joined = &mut monitor_task => match joined {
                Ok(Err(err)) => {
                    error!(%err, "Monitor exhausted reconnect attempts");
                    self.send_notification(NotifierEvent::Fatal {
                        reason: err.to_string(),
                    });
                    Err(OrchestratorError::Connectivity(err))
                }
                _ => Ok(()),
            },
            _ = self.shutdown.notified() => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        monitor_task.abort();
        event_task.abort();
        manager_task.abort();
        autosave_task.abort();
        self.save_state().await;
        info!("Trading engine stopped");
        result
    }

    /// Request a graceful stop; `run` persists state on the way out.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    fn monitor_settings(&self) -> MonitorSettings {
        let watchlist = self
            .config
            .altcoin
            .watchlist
            .iter()
            .filter_map(|raw| match TokenAddress::new(raw) {
                Ok(address) => Some(address),
                Err(err) => {
                    warn!(token = %raw, %err, "Invalid watchlist address, skipping");
                    None
                }
            })
            .collect();
        MonitorSettings {
            replay_lookback_blocks: self.config.monitor.replay_lookback_blocks,
            max_reconnect_attempts: self.config.monitor.max_reconnect_attempts,
            dedup_window: self.config.monitor.dedup_window,
            watchlist,
        }
    }

    /// Consume chain events until the channel closes, dispatching each to
    /// its strategy.
    async fn event_loop(self: Arc<Self>, mut events_rx: mpsc::Receiver<ChainEvent>) {
        while let Some(event) = events_rx.recv().await {
            let strategy = match &event {
                ChainEvent::Launch(_) => StrategyId::Memecoin,
                ChainEvent::Signal(_) => StrategyId::Altcoin,
            };
            if !self.handle(strategy).is_active() {
                continue;
            }
            match self.evaluator.evaluate(&event).await {
                Ok(Verdict::Accept(sized)) => {
                    self.open_position(sized).await;
                    self.save_state().await;
                }
                Ok(Verdict::Reject(_)) => {}
                Err(err) => {
                    // A ledger invariant violation means capital accounting
                    // can no longer be trusted for this strategy.
                    error!(%strategy, %err, "Halting strategy");
                    self.handle(strategy).halt();
                    self.send_notification(NotifierEvent::StrategyHalted {
                        strategy,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    async fn open_position(&self, sized: SizedOrder) {
        let token = sized.order.token.address.clone();
        match self.lifecycle.open(sized).await {
            Ok(position_id) => {
                info!(%position_id, %token, "Position opened");
            }
            Err(err) => {
                // The lifecycle already released the reservation and
                // notified; nothing to unwind here.
                warn!(%token, %err, "Entry failed");
            }
        }
    }

    async fn autosave_loop(self: Arc<Self>) {
        let mut tick = tokio::time::interval(AUTOSAVE_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.save_state().await;
            self.check_gas_balance().await;
        }
    }

    /// Pause new entries when the wallet can no longer pay for gas. Exits
    /// keep running so live positions can still be unwound. The alarm
    /// clears itself once the wallet is topped up.
    async fn check_gas_balance(&self) {
        let balance = match self.chain.wallet_balance_eth().await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(%err, "Wallet balance check failed");
                return;
            }
        };
        let floor = self.config.execution.min_wallet_balance_eth;
        if balance < floor {
            if !self.gas_alarmed.swap(true, Ordering::SeqCst) {
                error!(balance, floor, "Wallet gas balance below floor, pausing entries");
                for handle in self.handles.values() {
                    handle.set_paused(true);
                }
                self.send_notification(NotifierEvent::Fatal {
                    reason: format!("wallet gas balance {balance:.6} ETH below {floor} ETH floor"),
                });
            }
        } else if self.gas_alarmed.swap(false, Ordering::SeqCst) {
            info!(balance, "Wallet gas balance restored, resuming entries");
            for handle in self.handles.values() {
                handle.set_paused(false);
            }
        }
    }

    /// Snapshot ledger, positions and blacklist to the state file.
    pub async fn save_state(&self) {
        let ledger = self.ledger.with_ledger(Clone::clone).await;
        let positions = self.book.snapshot().await;
        let blacklist = self.blacklist.snapshot().await;
        let state = EngineState::new(ledger, positions, blacklist);
        if let Err(err) = state.save(&self.state_path) {
            error!(path = %self.state_path.display(), %err, "State save failed");
        }
    }

    fn handle(&self, strategy: StrategyId) -> &StrategyHandle {
        // Both handles exist from construction.
        &self.handles[&strategy]
    }

    fn send_notification(&self, event: NotifierEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(event).await {
                warn!(%err, "Notification delivery failed");
            }
        });
    }

    // Command surface. The CLI and any future API call these; the engine
    // never parses user text itself.

    /// Manually buy or sell a token under a strategy's capital rules.
    /// Manual orders skip opportunity scoring but never skip the ledger.
    pub async fn submit_manual_order(
        &self,
        token: TokenAddress,
        strategy: StrategyId,
        side: Side,
    ) -> Result<(), CommandError> {
        if !self.handle(strategy).is_running() {
            return Err(CommandError::StrategyNotRunning(strategy));
        }
        match side {
            Side::Buy => {
                let max = match strategy {
                    StrategyId::Memecoin => decimal(self.config.memecoin.max_investment_usd),
                    StrategyId::Altcoin => decimal(self.config.altcoin.max_investment_usd),
                };
                let reservation = self
                    .ledger
                    .reserve_up_to(strategy, max, decimal(self.config.ledger.min_order_usd))
                    .await
                    .map_err(|e| CommandError::OrderFailed(e.to_string()))?
                    .ok_or(CommandError::InsufficientCapital(strategy))?;
                let order = crate::domain::TradeOrder::buy(
                    Token::unnamed(token),
                    reservation.amount,
                    self.config.execution.slippage_tolerance,
                    self.config.execution.max_gas_price_gwei,
                    strategy,
                    self.config.execution.order_ttl_secs as i64,
                );
                self.lifecycle
                    .open(SizedOrder { order, reservation })
                    .await
                    .map_err(|e| CommandError::OrderFailed(e.to_string()))?;
            }
            Side::Sell => {
                let position_id = self
                    .book
                    .with_book(|book| {
                        book.live()
                            .find(|p| p.token.address == token)
                            .map(|p| p.id)
                    })
                    .await
                    .ok_or_else(|| CommandError::NoPosition(token.clone()))?;
                let closed = self
                    .lifecycle
                    .close(position_id, crate::domain::ExitReason::Manual)
                    .await
                    .map_err(|e| CommandError::OrderFailed(e.to_string()))?;
                if !closed {
                    return Err(CommandError::OrderFailed(
                        "all routes exhausted, position stays open".to_string(),
                    ));
                }
            }
        }
        self.save_state().await;
        Ok(())
    }

    pub async fn status(&self) -> EngineStatus {
        let memecoin = self.handle(StrategyId::Memecoin);
        let altcoin = self.handle(StrategyId::Altcoin);
        EngineStatus {
            memecoin_running: memecoin.is_running(),
            memecoin_paused: memecoin.is_paused(),
            altcoin_running: altcoin.is_running(),
            altcoin_paused: altcoin.is_paused(),
            memecoin_account: self.ledger.account(StrategyId::Memecoin).await,
            altcoin_account: self.ledger.account(StrategyId::Altcoin).await,
            open_positions: self.book.live().await.len(),
            blacklisted_tokens: self.blacklist.snapshot().await.len(),
        }
    }

    pub async fn open_positions(&self) -> Vec<Position> {
        self.book.live().await
    }

    pub fn pause(&self, strategy: StrategyId) {
        info!(%strategy, "Strategy paused");
        self.handle(strategy).set_paused(true);
    }

    pub fn resume(&self, strategy: StrategyId) {
        info!(%strategy, "Strategy resumed");
        self.handle(strategy).set_paused(false);
    }

    /// Operator blacklist. Any live position in the token is liquidated by
    /// the position manager on its next cycle.
    pub async fn blacklist_token(&self, token: TokenAddress) -> bool {
        let added = self
            .blacklist
            .add(token.clone(), BlacklistReason::Manual)
            .await;
        if added {
            self.send_notification(NotifierEvent::TokenBlacklisted {
                token,
                reason: BlacklistReason::Manual.to_string(),
            });
            self.save_state().await;
        }
        added
    }
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
}
