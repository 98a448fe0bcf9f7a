use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CheckOutcome, TokenAddress};

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Malformed oracle response: {0}")]
    Malformed(String),

    #[error("Rate limited")]
    RateLimited,
}

/// External scam/verification checks. The scorer maps any `Err` or timeout
/// to `CheckOutcome::Unknown`; an oracle must never report `Clear` unless
/// the check actually completed.
#[async_trait]
pub trait SecurityOracle: Send + Sync {
    /// Simulate a buy-then-sell; `Confirmed` means the sell is blocked.
    async fn check_honeypot(&self, token: &TokenAddress) -> Result<CheckOutcome, OracleError>;

    /// `Confirmed` means the contract source is NOT verified on the explorer.
    async fn check_verified(&self, token: &TokenAddress) -> Result<CheckOutcome, OracleError>;

    /// Current holder count from the explorer.
    async fn fetch_holder_count(&self, token: &TokenAddress) -> Result<u64, OracleError>;
}
