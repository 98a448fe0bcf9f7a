//! Opportunity Evaluator
//!
//! Turns chain events into sized, capital-backed orders or cheap typed
//! rejections. The rejection ladder runs cheapest-first: blacklist and
//! local floors before any oracle call, oracle-backed risk scoring before
//! sizing. Sizing and reservation happen in one ledger critical section,
//! so concurrent opportunities can never jointly overdraw a strategy's
//! ceiling.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::{
    ChainEvent, LaunchEvent, LedgerError, Reservation, SharedBlacklist, SharedLedger, SignalEvent,
    StrategyId, Token, TokenAddress, TokenSnapshot, TradeOrder,
};
use crate::ports::SecurityOracle;
use crate::position::SharedPositionBook;
use crate::scorer::RiskScorer;

use super::rules::{launch_score, SwingEntryRule, LAUNCH_SCORE_MIN};

/// Why an event produced no order. The common case, and cheap to build.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Blacklisted,
    AlreadyInPosition,
    CooldownActive,
    LiquidityBelowMin { have: f64, need: f64 },
    HoldersBelowMin { have: u64, need: u64 },
    RiskTooHigh { score: f64, max: f64 },
    LaunchScoreTooLow { score: f64 },
    EntryRuleNotMet,
    InsufficientCapital,
}

/// An accepted opportunity: the order plus the capital reserved for it.
/// The reservation travels with the order to the router, which commits it
/// on fill or releases it on any failure.
#[derive(Debug)]
pub struct SizedOrder {
    pub order: TradeOrder,
    pub reservation: Reservation,
}

#[derive(Debug)]
pub enum Verdict {
    Accept(SizedOrder),
    Reject(Rejection),
}

pub struct EvaluatorSettings {
    pub meme_max_investment: Decimal,
    pub meme_min_liquidity_eth: f64,
    pub meme_min_holders: u64,
    pub meme_cooldown: Duration,
    pub alt_max_investment: Decimal,
    pub swing_rule: SwingEntryRule,
    pub min_order_usd: Decimal,
    pub max_risk_score: f64,
    pub slippage_tolerance: f64,
    pub max_gas_price_gwei: u64,
    pub order_ttl_secs: i64,
}

impl EvaluatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            meme_max_investment: decimal(config.memecoin.max_investment_usd),
            meme_min_liquidity_eth: config.memecoin.min_liquidity_eth,
            meme_min_holders: config.memecoin.min_holders,
            meme_cooldown: Duration::from_secs(config.memecoin.purchase_cooldown_secs),
            alt_max_investment: decimal(config.altcoin.max_investment_usd),
            swing_rule: SwingEntryRule {
                rsi_entry_max: config.altcoin.rsi_entry_max,
                min_volume_change_pct: config.altcoin.min_volume_change_pct,
            },
            min_order_usd: decimal(config.ledger.min_order_usd),
            max_risk_score: config.risk.max_risk_score,
            slippage_tolerance: config.execution.slippage_tolerance,
            max_gas_price_gwei: config.execution.max_gas_price_gwei,
            order_ttl_secs: config.execution.order_ttl_secs as i64,
        }
    }
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
}

pub struct Evaluator {
    scorer: Arc<RiskScorer>,
    oracle: Arc<dyn SecurityOracle>,
    ledger: SharedLedger,
    blacklist: SharedBlacklist,
    book: SharedPositionBook,
    settings: EvaluatorSettings,
    cooldowns: Mutex<HashMap<TokenAddress, tokio::time::Instant>>,
}

impl Evaluator {
    pub fn new(
        scorer: Arc<RiskScorer>,
        oracle: Arc<dyn SecurityOracle>,
        ledger: SharedLedger,
        blacklist: SharedBlacklist,
        book: SharedPositionBook,
        settings: EvaluatorSettings,
    ) -> Self {
        Self {
            scorer,
            oracle,
            ledger,
            blacklist,
            book,
            settings,
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    /// The only error surfaced here is a ledger invariant violation, which
    /// is fatal to the strategy. Everything else is a `Verdict::Reject`.
    pub async fn evaluate(&self, event: &ChainEvent) -> Result<Verdict, LedgerError> {
        let verdict = match event {
            ChainEvent::Launch(launch) => self.evaluate_launch(launch).await?,
            ChainEvent::Signal(signal) => self.evaluate_signal(signal).await?,
        };
        if let Verdict::Reject(reason) = &verdict {
            debug!(token = %event.token(), ?reason, "opportunity rejected");
        }
        Ok(verdict)
    }

    async fn evaluate_launch(&self, launch: &LaunchEvent) -> Result<Verdict, LedgerError> {
        if let Some(rejection) = self.common_gates(&launch.token, true).await {
            return Ok(Verdict::Reject(rejection));
        }

        // Local floor before any oracle round-trip: a thin pool never even
        // gets scored.
        if launch.liquidity_eth < self.settings.meme_min_liquidity_eth {
            return Ok(Verdict::Reject(Rejection::LiquidityBelowMin {
                have: launch.liquidity_eth,
                need: self.settings.meme_min_liquidity_eth,
            }));
        }

        let holders = self
            .oracle
            .fetch_holder_count(&launch.token)
            .await
            .unwrap_or_else(|err| {
                debug!(token = %launch.token, %err, "holder lookup failed, assuming zero");
                0
            });
        if holders < self.settings.meme_min_holders {
            return Ok(Verdict::Reject(Rejection::HoldersBelowMin {
                have: holders,
                need: self.settings.meme_min_holders,
            }));
        }

        let snapshot = TokenSnapshot::new(launch.liquidity_eth, holders);
        let assessment = self.scorer.assess(&launch.token, &snapshot).await;
        if assessment.score > self.settings.max_risk_score {
            return Ok(Verdict::Reject(Rejection::RiskTooHigh {
                score: assessment.score,
                max: self.settings.max_risk_score,
            }));
        }

        let score = launch_score(launch.liquidity_eth, holders, &assessment);
        if score < LAUNCH_SCORE_MIN {
            return Ok(Verdict::Reject(Rejection::LaunchScoreTooLow { score }));
        }

        self.size_and_accept(
            Token::unnamed(launch.token.clone()),
            StrategyId::Memecoin,
            self.settings.meme_max_investment,
        )
        .await
    }

    async fn evaluate_signal(&self, signal: &SignalEvent) -> Result<Verdict, LedgerError> {
        if let Some(rejection) = self.common_gates(&signal.token, false).await {
            return Ok(Verdict::Reject(rejection));
        }

        if !self.settings.swing_rule.is_met(&signal.signal) {
            return Ok(Verdict::Reject(Rejection::EntryRuleNotMet));
        }

        // Watchlist tokens are established; pool depth is not re-checked.
        let holders = self
            .oracle
            .fetch_holder_count(&signal.token)
            .await
            .unwrap_or(u64::MAX);
        let snapshot = TokenSnapshot::new(f64::INFINITY, holders);
        let assessment = self.scorer.assess(&signal.token, &snapshot).await;
        if assessment.score > self.settings.max_risk_score {
            return Ok(Verdict::Reject(Rejection::RiskTooHigh {
                score: assessment.score,
                max: self.settings.max_risk_score,
            }));
        }

        self.size_and_accept(
            Token::unnamed(signal.token.clone()),
            StrategyId::Altcoin,
            self.settings.alt_max_investment,
        )
        .await
    }

    /// Gates shared by both paths, cheapest first.
    async fn common_gates(&self, token: &TokenAddress, cooldown: bool) -> Option<Rejection> {
        if self.blacklist.contains(token).await {
            return Some(Rejection::Blacklisted);
        }
        if self.book.has_live_for(token).await {
            return Some(Rejection::AlreadyInPosition);
        }
        if cooldown {
            let cooldowns = self.cooldowns.lock().await;
            if let Some(last) = cooldowns.get(token) {
                if last.elapsed() < self.settings.meme_cooldown {
                    return Some(Rejection::CooldownActive);
                }
            }
        }
        None
    }

    /// Sizing and reservation are atomic within the ledger lock.
    async fn size_and_accept(
        &self,
        token: Token,
        strategy: StrategyId,
        max_investment: Decimal,
    ) -> Result<Verdict, LedgerError> {
        let reservation = match self
            .ledger
            .reserve_up_to(strategy, max_investment, self.settings.min_order_usd)
            .await?
        {
            Some(reservation) => reservation,
            None => return Ok(Verdict::Reject(Rejection::InsufficientCapital)),
        };

        if strategy == StrategyId::Memecoin {
            self.cooldowns
                .lock()
                .await
                .insert(token.address.clone(), tokio::time::Instant::now());
        }

        let order = TradeOrder::buy(
            token,
            reservation.amount,
            self.settings.slippage_tolerance,
            self.settings.max_gas_price_gwei,
            strategy,
            self.settings.order_ttl_secs,
        );
        info!(
            order_id = %order.id,
            token = %order.token.address,
            %strategy,
            notional = %reservation.amount,
            "opportunity accepted"
        );
        Ok(Verdict::Accept(SizedOrder { order, reservation }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlacklistReason, EntrySignal, Ledger};
    use crate::ports::mocks::MockSecurityOracle;
    use crate::scorer::ScorerSettings;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn token(n: u8) -> TokenAddress {
        TokenAddress::new(&format!("0x{:040x}", n)).unwrap()
    }

    fn launch(n: u8, liquidity: f64) -> ChainEvent {
        ChainEvent::Launch(LaunchEvent {
            token: token(n),
            pair_address: token(n.wrapping_add(100)),
            liquidity_eth: liquidity,
            tx_hash: format!("0xtx{n}"),
            log_index: 0,
            detected_at: Utc::now(),
        })
    }

    fn signal(n: u8, rsi: f64) -> ChainEvent {
        ChainEvent::Signal(SignalEvent {
            token: token(n),
            signal: EntrySignal {
                rsi,
                macd_histogram: 0.3,
                volume_change_pct: 40.0,
            },
            price_usd: 1.0,
            detected_at: Utc::now(),
        })
    }

    fn settings() -> EvaluatorSettings {
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

    struct Fixture {
        evaluator: Evaluator,
        oracle: MockSecurityOracle,
        blacklist: SharedBlacklist,
        book: SharedPositionBook,
    }

    fn fixture(oracle: MockSecurityOracle) -> Fixture {
        fixture_with_ledger(oracle, Ledger::new(dec!(80), dec!(150)))
    }

    fn fixture_with_ledger(oracle: MockSecurityOracle, ledger: Ledger) -> Fixture {
        let blacklist = SharedBlacklist::default();
        let book = SharedPositionBook::new();
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
            SharedLedger::new(ledger),
            blacklist.clone(),
            book.clone(),
            settings(),
        );
        Fixture {
            evaluator,
            oracle,
            blacklist,
            book,
        }
    }

    #[tokio::test]
    async fn test_clean_launch_accepted_at_full_size() {
        let f = fixture(MockSecurityOracle::clear().with_holder_count(300));
        match f.evaluator.evaluate(&launch(1, 0.5)).await.unwrap() {
            Verdict::Accept(sized) => {
                assert_eq!(sized.reservation.amount, dec!(8));
                assert_eq!(sized.order.strategy, StrategyId::Memecoin);
                assert_eq!(sized.order.notional_usd, dec!(8));
            }
            Verdict::Reject(r) => panic!("unexpected rejection {r:?}"),
        }
    }

    #[tokio::test]
    async fn test_thin_pool_rejected_before_any_oracle_call() {
        let f = fixture(MockSecurityOracle::clear());
        match f.evaluator.evaluate(&launch(1, 0.005)).await.unwrap() {
            Verdict::Reject(Rejection::LiquidityBelowMin { have, need }) => {
                assert_eq!(have, 0.005);
                assert_eq!(need, 0.01);
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert_eq!(f.oracle.honeypot_call_count(), 0);
    }

    #[tokio::test]
    async fn test_blacklisted_token_rejected() {
        let f = fixture(MockSecurityOracle::clear());
        f.blacklist.add(token(1), BlacklistReason::Manual).await;
        let verdict = f.evaluator.evaluate(&launch(1, 0.5)).await.unwrap();
        assert!(matches!(verdict, Verdict::Reject(Rejection::Blacklisted)));
    }

    #[tokio::test]
    async fn test_honeypot_rejected_as_too_risky() {
        let f = fixture(
            MockSecurityOracle::clear()
                .with_holder_count(300)
                .with_honeypot(crate::domain::CheckOutcome::Confirmed),
        );
        match f.evaluator.evaluate(&launch(1, 0.5)).await.unwrap() {
            Verdict::Reject(Rejection::RiskTooHigh { score, .. }) => assert_eq!(score, 1.0),
            other => panic!("unexpected verdict {other:?}"),
        }
        assert!(f.blacklist.contains(&token(1)).await);
    }

    #[tokio::test]
    async fn test_few_holders_rejected() {
        let f = fixture(MockSecurityOracle::clear().with_holder_count(10));
        let verdict = f.evaluator.evaluate(&launch(1, 0.5)).await.unwrap();
        assert!(matches!(
            verdict,
            Verdict::Reject(Rejection::HoldersBelowMin { have: 10, need: 50 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchase_cooldown_blocks_reentry() {
        let f = fixture(MockSecurityOracle::clear().with_holder_count(300));
        let first = f.evaluator.evaluate(&launch(1, 0.5)).await.unwrap();
        assert!(matches!(first, Verdict::Accept(_)));
        let second = f.evaluator.evaluate(&launch(1, 0.5)).await.unwrap();
        assert!(matches!(
            second,
            Verdict::Reject(Rejection::CooldownActive)
        ));
        // Past the cooldown the token is evaluable again (and rejected for
        // capital only if none is left).
        tokio::time::advance(Duration::from_secs(31)).await;
        let third = f.evaluator.evaluate(&launch(1, 0.5)).await.unwrap();
        assert!(matches!(third, Verdict::Accept(_)));
    }

    #[tokio::test]
    async fn test_live_position_blocks_reentry() {
        let f = fixture(MockSecurityOracle::clear().with_holder_count(300));
        let position = crate::domain::Position::opening(
            Token::unnamed(token(1)),
            StrategyId::Memecoin,
            dec!(8),
        );
        f.book.insert(position).await;
        let verdict = f.evaluator.evaluate(&launch(1, 0.5)).await.unwrap();
        assert!(matches!(
            verdict,
            Verdict::Reject(Rejection::AlreadyInPosition)
        ));
    }

    #[tokio::test]
    async fn test_swing_signal_accepted_when_rule_met() {
        let f = fixture(MockSecurityOracle::clear());
        match f.evaluator.evaluate(&signal(2, 28.0)).await.unwrap() {
            Verdict::Accept(sized) => {
                assert_eq!(sized.order.strategy, StrategyId::Altcoin);
                assert_eq!(sized.reservation.amount, dec!(100));
            }
            Verdict::Reject(r) => panic!("unexpected rejection {r:?}"),
        }
    }

    #[tokio::test]
    async fn test_swing_signal_rejected_when_rsi_high() {
        let f = fixture(MockSecurityOracle::clear());
        let verdict = f.evaluator.evaluate(&signal(2, 60.0)).await.unwrap();
        assert!(matches!(
            verdict,
            Verdict::Reject(Rejection::EntryRuleNotMet)
        ));
    }

    #[tokio::test]
    async fn test_two_opportunities_split_remaining_capital() {
        // 150 available, both want 100: one gets 100, the other 50.
        let f = fixture_with_ledger(
            MockSecurityOracle::clear(),
            Ledger::new(dec!(80), dec!(150)),
        );
        let amounts: Vec<Decimal> = {
            let mut out = Vec::new();
            for n in [2u8, 3] {
                match f.evaluator.evaluate(&signal(n, 28.0)).await.unwrap() {
                    Verdict::Accept(sized) => out.push(sized.reservation.amount),
                    Verdict::Reject(r) => panic!("unexpected rejection {r:?}"),
                }
            }
            out
        };
        assert_eq!(amounts, vec![dec!(100), dec!(50)]);
        let third = f.evaluator.evaluate(&signal(4, 28.0)).await.unwrap();
        assert!(matches!(
            third,
            Verdict::Reject(Rejection::InsufficientCapital)
        ));
    }
}
