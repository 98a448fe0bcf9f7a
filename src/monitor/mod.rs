//! Chain Event Monitor
//!
//! Holds the live feed subscription and turns raw chain observations into
//! `ChainEvent`s for the strategy loops. It never scores and never trades.
//!
//! Stream drops are retried with exponential backoff plus jitter, bounded
//! by `max_reconnect_attempts`; after a successful reconnect the gap is
//! filled by replaying a bounded look-back window. Pair creations are
//! deduplicated by `(tx_hash, log_index)` so a replayed launch can never
//! produce a second order downstream.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::{ChainEvent, EntrySignal, LaunchEvent, SignalEvent, TokenAddress};
use crate::ports::{ChainFeed, FeedEvent, IndicatorSource};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Chain connectivity lost after {attempts} reconnect attempts")]
    ConnectivityLost { attempts: u32 },
}

pub struct MonitorSettings {
    pub replay_lookback_blocks: u64,
    pub max_reconnect_attempts: u32,
    pub dedup_window: usize,
    pub watchlist: Vec<TokenAddress>,
}

/// Bounded seen-set over `(tx_hash, log_index)` keys. Oldest entries are
/// evicted first once the window is full.
struct DedupWindow {
    capacity: usize,
    seen: HashSet<(String, u64)>,
    order: VecDeque<(String, u64)>,
}

impl DedupWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns false if the key was already present.
    fn insert(&mut self, key: (String, u64)) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

pub struct ChainMonitor {
    feed: Arc<dyn ChainFeed>,
    indicators: Arc<dyn IndicatorSource>,
    events_tx: mpsc::Sender<ChainEvent>,
    settings: MonitorSettings,
    dedup: DedupWindow,
    last_seen_block: Option<u64>,
    last_signals: HashMap<TokenAddress, EntrySignal>,
}

impl ChainMonitor {
    pub fn new(
        feed: Arc<dyn ChainFeed>,
        indicators: Arc<dyn IndicatorSource>,
        events_tx: mpsc::Sender<ChainEvent>,
        settings: MonitorSettings,
    ) -> Self {
        let dedup = DedupWindow::new(settings.dedup_window);
        Self {
            feed,
            indicators,
            events_tx,
            settings,
            dedup,
            last_seen_block: None,
            last_signals: HashMap::new(),
        }
    }

    /// Run until the event channel closes (engine shutdown) or reconnect
    /// attempts are exhausted (fatal to the orchestrator).
    pub async fn run(mut self) -> Result<(), MonitorError> {
        let mut attempts: u32 = 0;
        loop {
            match self.feed.subscribe().await {
                Ok(rx) => {
                    attempts = 0;
                    if let Err(err) = self.fill_gap().await {
                        warn!(%err, "replay after reconnect failed, continuing live");
                    }
                    if self.consume(rx).await.is_err() {
                        // Receiver dropped: engine is shutting down.
                        return Ok(());
                    }
                    warn!("chain feed stream ended, reconnecting");
                }
                Err(err) => {
                    attempts += 1;
                    if attempts >= self.settings.max_reconnect_attempts {
                        return Err(MonitorError::ConnectivityLost { attempts });
                    }
                    let delay = backoff_delay(attempts);
                    warn!(%err, attempt = attempts, ?delay, "feed connect failed, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Replay the missed window after a reconnect. Events older than the
    /// look-back bound are accepted as lost.
    async fn fill_gap(&mut self) -> Result<(), crate::ports::ChainFeedError> {
        let Some(last_seen) = self.last_seen_block else {
            return Ok(());
        };
        let latest = self.feed.latest_block().await?;
        if latest <= last_seen {
            return Ok(());
        }
        // Anything older than the look-back bound is accepted as lost.
        let from = (last_seen + 1).max(latest.saturating_sub(self.settings.replay_lookback_blocks));
        if from > latest {
            return Ok(());
        }
        info!(from, to = latest, "replaying missed blocks");
        let events = self.feed.replay(from, latest).await?;
        for event in events {
            // Channel closure here is handled by the next consume pass.
            let _ = self.handle_feed_event(event).await;
        }
        Ok(())
    }

    /// Drain the live stream. Err means the downstream channel closed.
    async fn consume(&mut self, mut rx: mpsc::Receiver<FeedEvent>) -> Result<(), ()> {
        while let Some(event) = rx.recv().await {
            self.handle_feed_event(event).await?;
        }
        Ok(())
    }

    async fn handle_feed_event(&mut self, event: FeedEvent) -> Result<(), ()> {
        match event {
            FeedEvent::PairCreated {
                token,
                pair_address,
                liquidity_eth,
                tx_hash,
                log_index,
                block_number,
            } => {
                self.note_block(block_number);
                if !self.dedup.insert((tx_hash.clone(), log_index)) {
                    debug!(%token, tx_hash, log_index, "duplicate pair creation dropped");
                    return Ok(());
                }
                info!(%token, liquidity_eth, block_number, "new pair detected");
                self.emit(ChainEvent::Launch(LaunchEvent {
                    token,
                    pair_address,
                    liquidity_eth,
                    tx_hash,
                    log_index,
                    detected_at: Utc::now(),
                }))
                .await
            }
            FeedEvent::NewBlock(n) => {
                self.note_block(n);
                self.poll_watchlist().await
            }
        }
    }

    fn note_block(&mut self, block: u64) {
        if self.last_seen_block.map_or(true, |seen| block > seen) {
            self.last_seen_block = Some(block);
        }
    }

    /// Emit a `SignalEvent` for each watched token whose indicator state
    /// changed since the last emission.
    async fn poll_watchlist(&mut self) -> Result<(), ()> {
        for token in self.settings.watchlist.clone() {
            let reading = match self.indicators.latest_reading(&token).await {
                Ok(Some(reading)) => reading,
                Ok(None) => continue,
                Err(err) => {
                    debug!(%token, %err, "indicator source unavailable");
                    continue;
                }
            };
            if self.last_signals.get(&token) == Some(&reading.signal) {
                continue;
            }
            self.last_signals.insert(token.clone(), reading.signal);
            self.emit(ChainEvent::Signal(SignalEvent {
                token,
                signal: reading.signal,
                price_usd: reading.price_usd,
                detected_at: Utc::now(),
            }))
            .await?;
        }
        Ok(())
    }

    async fn emit(&self, event: ChainEvent) -> Result<(), ()> {
        self.events_tx.send(event).await.map_err(|_| ())
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = Duration::from_secs(1 << attempt.min(6));
    let jitter = rand::thread_rng().gen_range(0..500);
    base.min(Duration::from_secs(60)) + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{MockChainFeed, MockIndicatorSource};

    fn token(n: u8) -> TokenAddress {
        TokenAddress::new(&format!("0x{:040x}", n)).unwrap()
    }

    fn pair_created(n: u8, tx: &str, log_index: u64, block: u64) -> FeedEvent {
        FeedEvent::PairCreated {
            token: token(n),
            pair_address: token(n.wrapping_add(1)),
            liquidity_eth: 0.5,
            tx_hash: tx.to_string(),
            log_index,
            block_number: block,
        }
    }

    fn settings() -> MonitorSettings {
        MonitorSettings {
            replay_lookback_blocks: 120,
            max_reconnect_attempts: 3,
            dedup_window: 64,
            watchlist: Vec::new(),
        }
    }

    fn monitor(
        feed: MockChainFeed,
        indicators: MockIndicatorSource,
        settings: MonitorSettings,
    ) -> (ChainMonitor, mpsc::Receiver<ChainEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (
            ChainMonitor::new(Arc::new(feed), Arc::new(indicators), tx, settings),
            rx,
        )
    }

    #[tokio::test]
    async fn test_launch_events_flow_through() {
        let feed = MockChainFeed::new()
            .with_subscription(vec![pair_created(1, "0xaaa", 0, 100)]);
        let (m, mut rx) = monitor(feed, MockIndicatorSource::new(), settings());
        tokio::spawn(m.run());
        let event = rx.recv().await.unwrap();
        match event {
            ChainEvent::Launch(launch) => assert_eq!(launch.token, token(1)),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_tx_log_index_dropped() {
        let feed = MockChainFeed::new().with_subscription(vec![
            pair_created(1, "0xaaa", 0, 100),
            pair_created(1, "0xaaa", 0, 100),
            pair_created(2, "0xaaa", 1, 100),
        ]);
        let (m, mut rx) = monitor(feed, MockIndicatorSource::new(), settings());
        tokio::spawn(m.run());
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, ChainEvent::Launch(ref l) if l.token == token(1)));
        assert!(matches!(second, ChainEvent::Launch(ref l) if l.log_index == 1));
        // Stream is exhausted: the duplicate produced nothing.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_replays_missed_window() {
        // First subscription sees block 100 then drops; the replay history
        // holds a launch at block 110 that the live stream missed.
        let feed = MockChainFeed::new()
            .with_subscription(vec![FeedEvent::NewBlock(100)])
            .with_subscription(vec![FeedEvent::NewBlock(121)])
            .with_history(vec![pair_created(7, "0xbbb", 2, 110)])
            .with_latest_block(120);
        let (m, mut rx) = monitor(feed, MockIndicatorSource::new(), settings());
        tokio::spawn(m.run());
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ChainEvent::Launch(ref l) if l.token == token(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_reconnects_then_fatal() {
        let feed = MockChainFeed::new().with_connect_failures(10);
        let (m, _rx) = monitor(feed, MockIndicatorSource::new(), settings());
        let err = m.run().await.unwrap_err();
        assert!(matches!(err, MonitorError::ConnectivityLost { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_watchlist_signal_emitted_once_per_change() {
        let watched = token(9);
        let signal = EntrySignal {
            rsi: 28.0,
            macd_histogram: 0.4,
            volume_change_pct: 35.0,
        };
        let indicators =
            MockIndicatorSource::new().with_reading(watched.clone(), signal, 1.25);
        let feed = MockChainFeed::new().with_subscription(vec![
            FeedEvent::NewBlock(1),
            FeedEvent::NewBlock(2),
        ]);
        let mut s = settings();
        s.watchlist = vec![watched.clone()];
        let (m, mut rx) = monitor(feed, indicators, s);
        tokio::spawn(m.run());
        let event = rx.recv().await.unwrap();
        match event {
            ChainEvent::Signal(sig) => {
                assert_eq!(sig.token, watched);
                assert_eq!(sig.price_usd, 1.25);
            }
            other => panic!("unexpected event {other:?}"),
        }
        // Unchanged reading on the next block emits nothing.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dedup_window_evicts_oldest() {
        let mut w = DedupWindow::new(2);
        assert!(w.insert(("a".into(), 0)));
        assert!(w.insert(("b".into(), 0)));
        assert!(w.insert(("c".into(), 0)));
        // "a" was evicted and is accepted again.
        assert!(w.insert(("a".into(), 0)));
        assert!(!w.insert(("c".into(), 0)));
    }
}
