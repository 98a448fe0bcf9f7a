//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chain: ChainSection,
    pub memecoin: MemecoinSection,
    pub altcoin: AltcoinSection,
    pub risk: RiskSection,
    pub monitor: MonitorSection,
    pub execution: ExecutionSection,
    pub ledger: LedgerSection,
    pub position: PositionSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub telegram: TelegramSection,
}

/// Chain RPC configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSection {
    /// JSON-RPC endpoint (use a private RPC for production)
    pub rpc_url: String,
    /// Chain id; Base mainnet is 8453
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Trading wallet address (the node manages the key)
    pub wallet_address: String,
    /// Block explorer API base URL (contract verification lookups)
    pub explorer_api_url: String,
    /// Optional explorer API key for higher rate limits
    #[serde(default)]
    pub explorer_api_key: Option<String>,
    /// Crash-recovery state file path
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl ChainSection {
    /// Get RPC URL with environment variable override
    /// Checks BASE_RPC_URL env var first, falls back to config value
    pub fn get_rpc_url(&self) -> String {
        std::env::var("BASE_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }

    /// Get explorer API key with environment variable fallback
    pub fn get_explorer_api_key(&self) -> Option<String> {
        std::env::var("EXPLORER_API_KEY")
            .ok()
            .or_else(|| self.explorer_api_key.clone())
    }

    /// State file path with `~` expanded
    pub fn expanded_state_file(&self) -> String {
        shellexpand::tilde(&self.state_file).to_string()
    }
}

/// Memecoin sniping strategy section
#[derive(Debug, Clone, Deserialize)]
pub struct MemecoinSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-position size cap in USD
    #[serde(default = "default_meme_max_investment")]
    pub max_investment_usd: f64,
    /// Exit target as a multiple of entry price (2.0 = +100%)
    #[serde(default = "default_meme_profit_target")]
    pub profit_target: f64,
    /// Stop loss as a multiple of entry price (0.7 = -30%)
    #[serde(default = "default_meme_stop_loss")]
    pub stop_loss: f64,
    /// Minimum initial pool liquidity in ETH
    #[serde(default = "default_min_liquidity_eth")]
    pub min_liquidity_eth: f64,
    /// Minimum holder count
    #[serde(default = "default_min_holders")]
    pub min_holders: u64,
    /// Time stop: force exit after this many hours
    #[serde(default = "default_meme_max_hold_hours")]
    pub max_hold_hours: u64,
    /// Per-token cooldown between purchases in seconds
    #[serde(default = "default_purchase_cooldown")]
    pub purchase_cooldown_secs: u64,
}

/// Altcoin swing strategy section
#[derive(Debug, Clone, Deserialize)]
pub struct AltcoinSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-position size cap in USD
    #[serde(default = "default_alt_max_investment")]
    pub max_investment_usd: f64,
    /// Exit target as a multiple of entry price (1.5 = +50%)
    #[serde(default = "default_alt_profit_target")]
    pub profit_target: f64,
    /// Stop loss as a multiple of entry price (0.85 = -15%)
    #[serde(default = "default_alt_stop_loss")]
    pub stop_loss: f64,
    /// Time stop: force exit after this many hours (7 days)
    #[serde(default = "default_alt_max_hold_hours")]
    pub max_hold_hours: u64,
    /// Rebalance pass cadence in hours
    #[serde(default = "default_rebalance_hours")]
    pub rebalance_hours: u64,
    /// Close positions whose share of the book exceeds this percentage
    #[serde(default = "default_max_weight_pct")]
    pub max_position_weight_pct: f64,
    /// Entry rule: RSI must be at or below this
    #[serde(default = "default_rsi_entry_max")]
    pub rsi_entry_max: f64,
    /// Entry rule: minimum 24h volume increase in percent
    #[serde(default = "default_min_volume_change")]
    pub min_volume_change_pct: f64,
    /// Established tokens watched for technical signals
    #[serde(default)]
    pub watchlist: Vec<String>,
    /// Technical indicator service base URL; watchlist polling is idle
    /// without one
    #[serde(default)]
    pub indicator_api_url: Option<String>,
}

/// Risk scorer section
#[derive(Debug, Clone, Deserialize)]
pub struct RiskSection {
    /// Reject opportunities scoring above this
    #[serde(default = "default_max_risk_score")]
    pub max_risk_score: f64,
    /// Per-check timeout in seconds (honeypot, verification)
    #[serde(default = "default_check_timeout")]
    pub check_timeout_secs: u64,
    /// Reuse assessments younger than this
    #[serde(default = "default_risk_ttl")]
    pub risk_ttl_secs: u64,
    /// Honeypot simulation API base URL
    pub honeypot_api_url: String,
}

/// Chain event monitor section
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// Blocks to replay after a reconnect (~4 min on Base at 2s blocks)
    #[serde(default = "default_replay_lookback")]
    pub replay_lookback_blocks: u64,
    /// Reconnect attempts before the monitor gives up
    #[serde(default = "default_max_reconnects")]
    pub max_reconnect_attempts: u32,
    /// Log poll cadence in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Size of the (tx_hash, log_index) dedup window
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,
    /// Factory contracts whose PairCreated logs count as launches
    #[serde(default = "default_factories")]
    pub factory_addresses: Vec<String>,
}

/// Execution router section
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    /// Slippage tolerance as a fraction (0.05 = 5%)
    #[serde(default = "default_slippage")]
    pub slippage_tolerance: f64,
    /// Gas price ceiling in gwei
    #[serde(default = "default_max_gas_gwei")]
    pub max_gas_price_gwei: u64,
    /// Order time-to-live in seconds; expired orders are dropped unsubmitted
    #[serde(default = "default_order_ttl")]
    pub order_ttl_secs: u64,
    /// Resubmit attempts on a nonce conflict
    #[serde(default = "default_nonce_retries")]
    pub max_nonce_retries: u32,
    /// Venues to route through, in configuration order
    #[serde(default = "default_venues")]
    pub venues: Vec<String>,
    /// Wallet gas balance floor in ETH; below it new entries are paused
    #[serde(default = "default_min_wallet_balance")]
    pub min_wallet_balance_eth: f64,
}

/// Capital ledger section
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSection {
    /// Memecoin strategy capital ceiling in USD
    #[serde(default = "default_meme_ceiling")]
    pub memecoin_ceiling_usd: f64,
    /// Altcoin strategy capital ceiling in USD
    #[serde(default = "default_alt_ceiling")]
    pub altcoin_ceiling_usd: f64,
    /// Orders sized below this are rejected
    #[serde(default = "default_min_order")]
    pub min_order_usd: f64,
}

/// Position manager section
#[derive(Debug, Clone, Deserialize)]
pub struct PositionSection {
    /// Re-price cadence for open positions in seconds
    #[serde(default = "default_position_poll")]
    pub poll_secs: u64,
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log to file (in addition to stdout)
    #[serde(default)]
    pub log_to_file: bool,
    /// Log file path
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// Telegram notification section (optional)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelegramSection {
    #[serde(default)]
    pub enabled: bool,
    /// Telegram bot token
    #[serde(default)]
    pub bot_token: String,
    /// Telegram chat ID
    #[serde(default)]
    pub chat_id: String,
}

impl TelegramSection {
    /// Get bot token with environment variable fallback
    /// Checks TELEGRAM_BOT_TOKEN env var if config value is empty
    pub fn get_bot_token(&self) -> Option<String> {
        std::env::var("TELEGRAM_BOT_TOKEN").ok().or_else(|| {
            if self.bot_token.is_empty() {
                None
            } else {
                Some(self.bot_token.clone())
            }
        })
    }
}

fn default_chain_id() -> u64 {
    8453
}
fn default_state_file() -> String {
    "~/.basehound/state.json".to_string()
}
fn default_true() -> bool {
    true
}
fn default_meme_max_investment() -> f64 {
    8.0
}
fn default_meme_profit_target() -> f64 {
    2.0
}
fn default_meme_stop_loss() -> f64 {
    0.7
}
fn default_min_liquidity_eth() -> f64 {
    0.01
}
fn default_min_holders() -> u64 {
    50
}
fn default_meme_max_hold_hours() -> u64 {
    24
}
fn default_purchase_cooldown() -> u64 {
    30
}
fn default_alt_max_investment() -> f64 {
    100.0
}
fn default_alt_profit_target() -> f64 {
    1.5
}
fn default_alt_stop_loss() -> f64 {
    0.85
}
fn default_alt_max_hold_hours() -> u64 {
    168
}
fn default_rebalance_hours() -> u64 {
    24
}
fn default_max_weight_pct() -> f64 {
    40.0
}
fn default_rsi_entry_max() -> f64 {
    35.0
}
fn default_min_volume_change() -> f64 {
    20.0
}
fn default_max_risk_score() -> f64 {
    0.7
}
fn default_check_timeout() -> u64 {
    5
}
fn default_risk_ttl() -> u64 {
    60
}
fn default_replay_lookback() -> u64 {
    120
}
fn default_max_reconnects() -> u32 {
    10
}
fn default_poll_interval() -> u64 {
    2
}
fn default_dedup_window() -> usize {
    2048
}
fn default_factories() -> Vec<String> {
    // Uniswap v2 and BaseSwap factories on Base.
    vec![
        "0x8909dc15e40173ff4699343b6eb8132c65e18ec6".to_string(),
        "0xfda619b6d20975be80a10332cd39b9a4b0faa8bb".to_string(),
    ]
}
fn default_slippage() -> f64 {
    0.05
}
fn default_max_gas_gwei() -> u64 {
    50
}
fn default_order_ttl() -> u64 {
    60
}
fn default_min_wallet_balance() -> f64 {
    0.002
}
fn default_nonce_retries() -> u32 {
    3
}
fn default_venues() -> Vec<String> {
    vec![
        "uniswap_v3".to_string(),
        "baseswap".to_string(),
        "camelot".to_string(),
    ]
}
fn default_meme_ceiling() -> f64 {
    80.0
}
fn default_alt_ceiling() -> f64 {
    500.0
}
fn default_min_order() -> f64 {
    1.0
}
fn default_position_poll() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> String {
    "basehound.log".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.rpc_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc_url cannot be empty".to_string(),
            ));
        }

        if self.chain.wallet_address.is_empty() {
            return Err(ConfigError::ValidationError(
                "wallet_address cannot be empty".to_string(),
            ));
        }

        if self.memecoin.profit_target <= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "memecoin profit_target must be > 1.0, got {}",
                self.memecoin.profit_target
            )));
        }

        if self.memecoin.stop_loss <= 0.0 || self.memecoin.stop_loss >= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "memecoin stop_loss must be in (0, 1), got {}",
                self.memecoin.stop_loss
            )));
        }

        if self.altcoin.profit_target <= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "altcoin profit_target must be > 1.0, got {}",
                self.altcoin.profit_target
            )));
        }

        if self.altcoin.stop_loss <= 0.0 || self.altcoin.stop_loss >= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "altcoin stop_loss must be in (0, 1), got {}",
                self.altcoin.stop_loss
            )));
        }

        if self.risk.max_risk_score <= 0.0 || self.risk.max_risk_score > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "max_risk_score must be in (0, 1], got {}",
                self.risk.max_risk_score
            )));
        }

        if self.execution.slippage_tolerance <= 0.0 || self.execution.slippage_tolerance >= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "slippage_tolerance must be in (0, 1), got {}",
                self.execution.slippage_tolerance
            )));
        }

        if self.execution.venues.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one venue must be configured".to_string(),
            ));
        }

        if self.ledger.memecoin_ceiling_usd <= 0.0 || self.ledger.altcoin_ceiling_usd <= 0.0 {
            return Err(ConfigError::ValidationError(
                "capital ceilings must be positive".to_string(),
            ));
        }

        if self.memecoin.max_investment_usd > self.ledger.memecoin_ceiling_usd {
            return Err(ConfigError::ValidationError(format!(
                "memecoin max_investment_usd {} exceeds its capital ceiling {}",
                self.memecoin.max_investment_usd, self.ledger.memecoin_ceiling_usd
            )));
        }

        if self.altcoin.max_investment_usd > self.ledger.altcoin_ceiling_usd {
            return Err(ConfigError::ValidationError(format!(
                "altcoin max_investment_usd {} exceeds its capital ceiling {}",
                self.altcoin.max_investment_usd, self.ledger.altcoin_ceiling_usd
            )));
        }

        if self.telegram.enabled && self.telegram.get_bot_token().is_none() {
            return Err(ConfigError::ValidationError(
                "telegram enabled but no bot_token configured".to_string(),
            ));
        }

        Ok(())
    }
}
