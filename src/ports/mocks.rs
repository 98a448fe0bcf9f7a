//! Scripted port implementations for unit and integration tests.
//!
//! Each mock records the calls it receives and replays responses configured
//! through builder methods, so tests can assert both behavior and the exact
//! interaction (e.g. "the router never saw this order").

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{CheckOutcome, EntrySignal, OrderId, Side, TokenAddress, TradeOrder};

use super::chain_feed::{ChainFeed, ChainFeedError, FeedEvent};
use super::dex::{DexAdapter, DexError, Quote, SwapBounds};
use super::indicator::{IndicatorError, IndicatorReading, IndicatorSource};
use super::notifier::{Notifier, NotifierError, NotifierEvent};
use super::security::{OracleError, SecurityOracle};

/// Scripted chain feed: each `subscribe` call drains the next batch of
/// events, and `replay` filters a fixed history by block range.
#[derive(Default)]
pub struct MockChainFeed {
    subscriptions: Arc<Mutex<VecDeque<Vec<FeedEvent>>>>,
    history: Arc<Mutex<Vec<FeedEvent>>>,
    failures_before_connect: Arc<AtomicU64>,
    latest_block: Arc<AtomicU64>,
}

impl MockChainFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one subscription's worth of live events.
    pub fn with_subscription(self, events: Vec<FeedEvent>) -> Self {
        self.subscriptions.lock().unwrap().push_back(events);
        self
    }

    /// Events visible to `replay`, in block order.
    pub fn with_history(self, events: Vec<FeedEvent>) -> Self {
        *self.history.lock().unwrap() = events;
        self
    }

    /// Fail the first `n` subscribe attempts with an RPC error.
    pub fn with_connect_failures(self, n: u64) -> Self {
        self.failures_before_connect.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_latest_block(self, block: u64) -> Self {
        self.latest_block.store(block, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl ChainFeed for MockChainFeed {
    async fn subscribe(&self) -> Result<mpsc::Receiver<FeedEvent>, ChainFeedError> {
        let remaining = self.failures_before_connect.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_before_connect
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ChainFeedError::Rpc("connection refused".into()));
        }
        let events = self
            .subscriptions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn replay(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<FeedEvent>, ChainFeedError> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|e| match e {
                FeedEvent::PairCreated { block_number, .. } => {
                    *block_number >= from_block && *block_number <= to_block
                }
                FeedEvent::NewBlock(n) => *n >= from_block && *n <= to_block,
            })
            .cloned()
            .collect())
    }

    async fn latest_block(&self) -> Result<u64, ChainFeedError> {
        Ok(self.latest_block.load(Ordering::SeqCst))
    }
}

enum SwapScript {
    Fill(String),
    Revert(String),
    NonceConflict,
}

/// One scripted venue. Swap outcomes are consumed in order, so a sequence
/// of revert, revert, ok exercises the router's fallback path.
pub struct MockDexAdapter {
    name: String,
    quote: Mutex<Option<Quote>>,
    swap_script: Mutex<VecDeque<SwapScript>>,
    quote_calls: Mutex<Vec<(TokenAddress, Side, f64)>>,
    swap_calls: Mutex<Vec<(OrderId, SwapBounds)>>,
}

impl MockDexAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            quote: Mutex::new(None),
            swap_script: Mutex::new(VecDeque::new()),
            quote_calls: Mutex::new(Vec::new()),
            swap_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_quote(self, price_usd: f64, amount_out: f64, fee_bps: u32) -> Self {
        *self.quote.lock().unwrap() = Some(Quote {
            venue: self.name.clone(),
            price_usd,
            amount_out,
            fee_bps,
            gas_estimate: 180_000,
        });
        self
    }

    /// Reprice the venue mid-test.
    pub fn set_quote(&self, price_usd: f64, amount_out: f64, fee_bps: u32) {
        *self.quote.lock().unwrap() = Some(Quote {
            venue: self.name.clone(),
            price_usd,
            amount_out,
            fee_bps,
            gas_estimate: 180_000,
        });
    }

    pub fn with_swap_ok(self, tx_hash: &str) -> Self {
        self.swap_script
            .lock()
            .unwrap()
            .push_back(SwapScript::Fill(tx_hash.to_string()));
        self
    }

    pub fn with_swap_revert(self, reason: &str) -> Self {
        self.swap_script
            .lock()
            .unwrap()
            .push_back(SwapScript::Revert(reason.to_string()));
        self
    }

    pub fn with_swap_nonce_conflict(self) -> Self {
        self.swap_script
            .lock()
            .unwrap()
            .push_back(SwapScript::NonceConflict);
        self
    }

    pub fn quote_calls(&self) -> Vec<(TokenAddress, Side, f64)> {
        self.quote_calls.lock().unwrap().clone()
    }

    pub fn swap_calls(&self) -> Vec<(OrderId, SwapBounds)> {
        self.swap_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DexAdapter for MockDexAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(
        &self,
        token: &TokenAddress,
        side: Side,
        amount: f64,
    ) -> Result<Quote, DexError> {
        self.quote_calls
            .lock()
            .unwrap()
            .push((token.clone(), side, amount));
        self.quote
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DexError::NoRoute {
                venue: self.name.clone(),
                token: token.clone(),
            })
    }

    async fn swap(&self, order: &TradeOrder, bounds: SwapBounds) -> Result<String, DexError> {
        self.swap_calls.lock().unwrap().push((order.id, bounds));
        match self.swap_script.lock().unwrap().pop_front() {
            Some(SwapScript::Fill(tx_hash)) => Ok(tx_hash),
            Some(SwapScript::Revert(reason)) => Err(DexError::Reverted {
                venue: self.name.clone(),
                reason,
            }),
            Some(SwapScript::NonceConflict) => Err(DexError::NonceConflict {
                expected: bounds.nonce + 1,
            }),
            None => Err(DexError::Timeout {
                venue: self.name.clone(),
            }),
        }
    }
}

/// Oracle with fixed outcomes; `slow` makes a check sleep past any timeout.
#[derive(Clone)]
pub struct MockSecurityOracle {
    honeypot: CheckOutcome,
    unverified: CheckOutcome,
    honeypot_error: bool,
    slow: bool,
    holder_count: u64,
    honeypot_calls: Arc<AtomicU64>,
}

impl MockSecurityOracle {
    pub fn clear() -> Self {
        Self {
            honeypot: CheckOutcome::Clear,
            unverified: CheckOutcome::Clear,
            honeypot_error: false,
            slow: false,
            holder_count: 200,
            honeypot_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_holder_count(mut self, count: u64) -> Self {
        self.holder_count = count;
        self
    }

    pub fn honeypot_call_count(&self) -> u64 {
        self.honeypot_calls.load(Ordering::SeqCst)
    }

    pub fn with_honeypot(mut self, outcome: CheckOutcome) -> Self {
        self.honeypot = outcome;
        self
    }

    pub fn with_unverified(mut self, outcome: CheckOutcome) -> Self {
        self.unverified = outcome;
        self
    }

    pub fn with_honeypot_error(mut self) -> Self {
        self.honeypot_error = true;
        self
    }

    pub fn slow(mut self) -> Self {
        self.slow = true;
        self
    }
}

#[async_trait]
impl SecurityOracle for MockSecurityOracle {
    async fn check_honeypot(&self, _token: &TokenAddress) -> Result<CheckOutcome, OracleError> {
        self.honeypot_calls.fetch_add(1, Ordering::SeqCst);
        if self.slow {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.honeypot_error {
            return Err(OracleError::Http("503".into()));
        }
        Ok(self.honeypot)
    }

    async fn check_verified(&self, _token: &TokenAddress) -> Result<CheckOutcome, OracleError> {
        if self.slow {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        Ok(self.unverified)
    }

    async fn fetch_holder_count(&self, _token: &TokenAddress) -> Result<u64, OracleError> {
        Ok(self.holder_count)
    }
}

/// Fixed reading per token.
#[derive(Default)]
pub struct MockIndicatorSource {
    readings: Mutex<HashMap<TokenAddress, IndicatorReading>>,
}

impl MockIndicatorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(self, token: TokenAddress, signal: EntrySignal, price_usd: f64) -> Self {
        self.readings
            .lock()
            .unwrap()
            .insert(token, IndicatorReading { signal, price_usd });
        self
    }
}

#[async_trait]
impl IndicatorSource for MockIndicatorSource {
    async fn latest_reading(
        &self,
        token: &TokenAddress,
    ) -> Result<Option<IndicatorReading>, IndicatorError> {
        Ok(self.readings.lock().unwrap().get(token).copied())
    }
}

/// Records every notification for assertion.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotifierEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: NotifierEvent) -> Result<(), NotifierError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
