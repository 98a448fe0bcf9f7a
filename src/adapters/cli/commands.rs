//! CLI Command Definitions
//!
//! Argument parsing only; handlers live in `main.rs` and drive the
//! orchestrator's command surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Basehound - launch sniping and swing trading on Base
#[derive(Parser, Debug)]
#[command(
    name = "basehound",
    version = env!("CARGO_PKG_VERSION"),
    about = "Dual-strategy DEX trading engine for Base",
    long_about = "Basehound snipes new token launches and swing-trades established \
                  altcoins on Base, with per-strategy capital isolation from one \
                  shared wallet."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the trading engine
    Run(RunCmd),

    /// Show capital accounts and engine state
    Status(StatusCmd),

    /// Manually buy a token under a strategy's capital rules
    Buy(BuyCmd),

    /// Manually close the live position in a token
    Sell(SellCmd),

    /// List open positions
    Positions(PositionsCmd),

    /// Add a token to the blacklist
    Blacklist(BlacklistCmd),
}

/// Start the trading engine
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/base.toml")]
    pub config: PathBuf,

    /// Override RPC URL
    #[arg(long, value_name = "URL")]
    pub rpc_url: Option<String>,
}

/// Show capital accounts and engine state
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/base.toml")]
    pub config: PathBuf,
}

/// Manual buy
#[derive(Parser, Debug)]
pub struct BuyCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/base.toml")]
    pub config: PathBuf,

    /// Token contract address (0x...)
    pub token: String,

    /// Strategy whose capital funds the order: memecoin or altcoin
    #[arg(short, long, default_value = "memecoin")]
    pub strategy: String,
}

/// Manual sell
#[derive(Parser, Debug)]
pub struct SellCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/base.toml")]
    pub config: PathBuf,

    /// Token contract address (0x...)
    pub token: String,
}

/// List open positions
#[derive(Parser, Debug)]
pub struct PositionsCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/base.toml")]
    pub config: PathBuf,
}

/// Blacklist a token
#[derive(Parser, Debug)]
pub struct BlacklistCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/base.toml")]
    pub config: PathBuf,

    /// Token contract address (0x...)
    pub token: String,
}
