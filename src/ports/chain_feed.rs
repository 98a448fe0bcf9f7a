use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::TokenAddress;

#[derive(Error, Debug)]
pub enum ChainFeedError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("Replay range too large: {from}..{to}")]
    ReplayRangeTooLarge { from: u64, to: u64 },
}

/// Raw on-chain observation before any scoring or filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A PairCreated-style log: new liquidity pool for `token`.
    PairCreated {
        token: TokenAddress,
        pair_address: TokenAddress,
        liquidity_eth: f64,
        tx_hash: String,
        log_index: u64,
        block_number: u64,
    },
    NewBlock(u64),
}

impl FeedEvent {
    /// Dedup key for pair creations; blocks are never deduplicated.
    pub fn dedup_key(&self) -> Option<(String, u64)> {
        match self {
            Self::PairCreated {
                tx_hash, log_index, ..
            } => Some((tx_hash.clone(), *log_index)),
            Self::NewBlock(_) => None,
        }
    }
}

/// Live chain event stream with bounded replay for reconnect gap-filling.
#[async_trait]
pub trait ChainFeed: Send + Sync {
    /// Open a live subscription. May be called again after a stream drop.
    async fn subscribe(&self) -> Result<mpsc::Receiver<FeedEvent>, ChainFeedError>;

    /// Fetch historical events for a closed block range, oldest first.
    async fn replay(&self, from_block: u64, to_block: u64)
        -> Result<Vec<FeedEvent>, ChainFeedError>;

    async fn latest_block(&self) -> Result<u64, ChainFeedError>;
}
