//! Adapters Layer - External System Implementations
//!
//! Implementations of the port traits:
//! - EVM: Base JSON-RPC client and the PairCreated log feed
//! - DEX: v2-style router venues sharing one calldata codec
//! - Security: honeypot simulation and explorer verification APIs
//! - Indicators: external technical-analysis service client
//! - Telegram: bot-API notifier and a log-only fallback
//! - CLI: clap command definitions for the binary

pub mod cli;
pub mod dex;
pub mod evm;
pub mod indicators;
pub mod security;
pub mod telegram;

pub use cli::CliApp;
pub use dex::{build_venues, RouterAdapter, VenueSpec};
pub use evm::{EvmChainFeed, EvmClient, EvmConfig};
pub use indicators::{HttpIndicatorSource, NoIndicators};
pub use security::{HttpSecurityOracle, OracleConfig};
pub use telegram::{LogNotifier, TelegramConfig, TelegramNotifier};
