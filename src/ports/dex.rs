use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Side, TokenAddress, TradeOrder};

#[derive(Error, Debug)]
pub enum DexError {
    #[error("Transaction reverted on {venue}: {reason}")]
    Reverted { venue: String, reason: String },

    #[error("Timed out waiting for {venue}")]
    Timeout { venue: String },

    #[error("No route for {token} on {venue}")]
    NoRoute { venue: String, token: TokenAddress },

    #[error("Nonce conflict (expected {expected})")]
    NonceConflict { expected: u64 },

    #[error("RPC error: {0}")]
    Rpc(String),
}

/// A venue's answer to "what would this order fill at right now".
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub venue: String,
    /// Price per token unit in USD.
    pub price_usd: f64,
    /// Tokens out for a buy, USD out for a sell, before fees.
    pub amount_out: f64,
    pub fee_bps: u32,
    pub gas_estimate: u64,
}

impl Quote {
    /// Output after the venue fee, the ranking criterion across venues.
    pub fn net_amount_out(&self) -> f64 {
        self.amount_out * (1.0 - self.fee_bps as f64 / 10_000.0)
    }
}

/// Slippage and gas bounds computed by the router from the winning quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapBounds {
    pub min_amount_out: f64,
    pub gas_price_gwei: u64,
    pub nonce: u64,
}

/// One DEX venue. The swap-call binary encoding stays inside the adapter.
#[async_trait]
pub trait DexAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn quote(
        &self,
        token: &TokenAddress,
        side: Side,
        amount: f64,
    ) -> Result<Quote, DexError>;

    /// Submit the swap and wait for the receipt. Returns the tx hash.
    async fn swap(&self, order: &TradeOrder, bounds: SwapBounds) -> Result<String, DexError>;
}
