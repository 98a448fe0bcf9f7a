//! EVM Adapter
//!
//! JSON-RPC client for a Base node plus the PairCreated log feed built on
//! top of it.

pub mod client;
pub mod feed;

pub use client::{EvmClient, EvmConfig, EvmError, LogEntry, TxReceipt, TxRequest};
pub use feed::{EvmChainFeed, PAIR_CREATED_TOPIC, WETH_ADDRESS};
