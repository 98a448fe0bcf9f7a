//! PairCreated log feed
//!
//! Polls the node for new blocks and factory `PairCreated` logs, decoding
//! them into [`FeedEvent`]s for the monitor. The stream deliberately ends
//! on a node failure; the monitor owns reconnect-with-replay, so dropping
//! the channel is the error signal here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::TokenAddress;
use crate::ports::{ChainFeed, ChainFeedError, FeedEvent};

use super::client::{parse_hex_u128, EvmClient, EvmError, LogEntry};

/// keccak("PairCreated(address,address,address,uint256)")
pub const PAIR_CREATED_TOPIC: &str =
    "0x0d3648bd0f6ba80134a33ba9275ac585d9d315f0ad8355cd0f6c33c6ae0c6cd2";

/// Canonical WETH on Base
pub const WETH_ADDRESS: &str = "0x4200000000000000000000000000000000000006";

/// getReserves() selector
const GET_RESERVES_CALL: &str = "0x0902f1ac";

/// Widest replay the node is asked for in one `eth_getLogs` call.
const MAX_REPLAY_SPAN: u64 = 10_000;

/// A decoded PairCreated log before the liquidity lookup.
#[derive(Debug, PartialEq)]
pub struct PairCreation {
    pub token: TokenAddress,
    pub pair: TokenAddress,
    /// True when WETH is token0 in the pair, fixing which reserve is ETH.
    pub weth_is_token0: bool,
}

/// Decode a factory PairCreated log. Returns `None` for pairs that do not
/// include WETH; the sniper only trades ETH-quoted pools.
pub fn decode_pair_created(log: &LogEntry) -> Option<PairCreation> {
    if log.topics.len() < 3 || !log.topics[0].eq_ignore_ascii_case(PAIR_CREATED_TOPIC) {
        return None;
    }
    let token0 = address_from_word(&log.topics[1])?;
    let token1 = address_from_word(&log.topics[2])?;
    // Pair address is the first data word.
    let data = log.data.strip_prefix("0x")?;
    if data.len() < 64 {
        return None;
    }
    let pair = address_from_word(&format!("0x{}", &data[..64]))?;

    let weth = TokenAddress::new(WETH_ADDRESS).ok()?;
    let (token, weth_is_token0) = if token0 == weth {
        (token1, true)
    } else if token1 == weth {
        (token0, false)
    } else {
        return None;
    };
    Some(PairCreation {
        token,
        pair,
        weth_is_token0,
    })
}

/// Extract the address from a 32-byte ABI word (last 20 bytes).
fn address_from_word(word: &str) -> Option<TokenAddress> {
    let hex = word.strip_prefix("0x")?;
    if hex.len() != 64 {
        return None;
    }
    TokenAddress::new(&format!("0x{}", &hex[24..])).ok()
}

/// Live chain feed over the JSON-RPC client.
pub struct EvmChainFeed {
    client: Arc<EvmClient>,
    /// Factory contracts whose PairCreated logs count as launches.
    factories: Vec<String>,
    poll_interval: Duration,
}

impl EvmChainFeed {
    pub fn new(client: Arc<EvmClient>, factories: Vec<String>, poll_interval: Duration) -> Self {
        let factories = factories.into_iter().map(|f| f.to_lowercase()).collect();
        Self {
            client,
            factories,
            poll_interval,
        }
    }

    async fn pair_events(
        client: &EvmClient,
        factories: &[String],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<FeedEvent>, EvmError> {
        let logs = client
            .get_logs(from_block, to_block, None, Some(PAIR_CREATED_TOPIC))
            .await?;
        let mut events = Vec::new();
        for log in logs {
            if !factories.iter().any(|f| f.eq_ignore_ascii_case(&log.address)) {
                continue;
            }
            let Some(creation) = decode_pair_created(&log) else {
                debug!(tx = %log.transaction_hash, "Skipping non-WETH pair");
                continue;
            };
            let liquidity_eth = match eth_reserve(client, &creation).await {
                Ok(eth) => eth,
                Err(e) => {
                    warn!(pair = %creation.pair, error = %e, "Reserve lookup failed");
                    0.0
                }
            };
            events.push(FeedEvent::PairCreated {
                token: creation.token,
                pair_address: creation.pair,
                liquidity_eth,
                tx_hash: log.transaction_hash.clone(),
                log_index: log.log_index()?,
                block_number: log.block_number()?,
            });
        }
        Ok(events)
    }
}

/// Read the pair's WETH-side reserve via `getReserves()`.
async fn eth_reserve(client: &EvmClient, creation: &PairCreation) -> Result<f64, EvmError> {
    let ret = client.call(creation.pair.as_str(), GET_RESERVES_CALL).await?;
    let data = ret.strip_prefix("0x").unwrap_or(&ret);
    if data.len() < 128 {
        return Err(EvmError::MalformedResponse(format!(
            "getReserves returned {} hex chars",
            data.len()
        )));
    }
    let word = if creation.weth_is_token0 {
        &data[..64]
    } else {
        &data[64..128]
    };
    let wei = parse_hex_u128(&format!("0x{}", word))?;
    Ok(wei as f64 / 1e18)
}

#[async_trait]
impl ChainFeed for EvmChainFeed {
    async fn subscribe(&self) -> Result<mpsc::Receiver<FeedEvent>, ChainFeedError> {
        let (tx, rx) = mpsc::channel(256);
        let client = Arc::clone(&self.client);
        let factories = self.factories.clone();
        let poll_interval = self.poll_interval;
        let mut last = self
            .client
            .block_number()
            .await
            .map_err(|e| ChainFeedError::Rpc(e.to_string()))?;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                let latest = match client.block_number().await {
                    Ok(block) => block,
                    Err(e) => {
                        // Drop the channel; the monitor reconnects with replay.
                        warn!(error = %e, "Block poll failed, closing feed");
                        return;
                    }
                };
                if latest <= last {
                    continue;
                }
                for block in last + 1..=latest {
                    if tx.send(FeedEvent::NewBlock(block)).await.is_err() {
                        return;
                    }
                }
                match Self::pair_events(&client, &factories, last + 1, latest).await {
                    Ok(events) => {
                        for event in events {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Log poll failed, closing feed");
                        return;
                    }
                }
                last = latest;
            }
        });
        Ok(rx)
    }

    async fn replay(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<FeedEvent>, ChainFeedError> {
        if to_block.saturating_sub(from_block) > MAX_REPLAY_SPAN {
            return Err(ChainFeedError::ReplayRangeTooLarge {
                from: from_block,
                to: to_block,
            });
        }
        Self::pair_events(&self.client, &self.factories, from_block, to_block)
            .await
            .map_err(|e| ChainFeedError::Rpc(e.to_string()))
    }

    async fn latest_block(&self) -> Result<u64, ChainFeedError> {
        self.client
            .block_number()
            .await
            .map_err(|e| ChainFeedError::Rpc(e.to_string()))
    }
}
