//! Basehound - Dual-Strategy DEX Trading Engine for Base
//!
//! Snipes new token launches and swing-trades established altcoins on
//! Base (chain id 8453), funding both strategies from one wallet with
//! strict per-strategy capital isolation.
//!
//! # Modules
//!
//! - `domain`: Tokens, orders, positions, the capital ledger and risk types
//! - `ports`: Trait seams (ChainFeed, DexAdapter, SecurityOracle, Notifier)
//! - `monitor`: Chain event monitor with reconnect-and-replay
//! - `scorer`: Security risk scorer with fails-closed oracle checks
//! - `strategy`: Opportunity evaluation and entry rules
//! - `execution`: Venue routing, nonce serialization, trade lifecycle
//! - `position`: Position book, exit triggers and rebalancing
//! - `persistence`: Crash-recovery state file
//! - `adapters`: EVM RPC, DEX venues, security APIs, Telegram, CLI
//! - `config`: TOML configuration loading and validation
//! - `application`: The orchestrator wiring it all together

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod execution;
pub mod monitor;
pub mod persistence;
pub mod ports;
pub mod position;
pub mod scorer;
pub mod strategy;
