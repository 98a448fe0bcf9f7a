//! Token identity and market snapshot
//!
//! A token's address/symbol/decimals never change; the market snapshot
//! (liquidity, holders, verification) is refreshed per evaluation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token address: {0}")]
    InvalidAddress(String),
}

/// EVM token address, normalized to lowercase hex at construction.
///
/// Two addresses that differ only in checksum casing compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn new(raw: &str) -> Result<Self, TokenError> {
        let trimmed = raw.trim();
        let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TokenError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable token identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: TokenAddress,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: TokenAddress, symbol: &str, name: &str, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
        }
    }

    /// Identity for a token seen only by address, as fresh launches are.
    pub fn unnamed(address: TokenAddress) -> Self {
        let short = format!(
            "{}..",
            &address.as_str()[..8.min(address.as_str().len())]
        );
        Self {
            symbol: short.clone(),
            name: short,
            decimals: 18,
            address,
        }
    }
}

/// Point-in-time market metrics for a token.
///
/// `verified: None` means the verification lookup has not resolved yet;
/// the scorer treats that as unknown, never as safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub liquidity_eth: f64,
    pub holder_count: u64,
    pub verified: Option<bool>,
    pub sampled_at: DateTime<Utc>,
}

impl TokenSnapshot {
    pub fn new(liquidity_eth: f64, holder_count: u64) -> Self {
        Self {
            liquidity_eth,
            holder_count,
            verified: None,
            sampled_at: Utc::now(),
        }
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    /// Age of this snapshot in seconds.
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.sampled_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_normalizes_case() {
        let a = TokenAddress::new("0x4200000000000000000000000000000000000006").unwrap();
        let b = TokenAddress::new("0x4200000000000000000000000000000000000006");
        assert_eq!(a, b.unwrap());
        let upper = TokenAddress::new("0xABCDEF0000000000000000000000000000000001").unwrap();
        let lower = TokenAddress::new("0xabcdef0000000000000000000000000000000001").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!(TokenAddress::new("not-an-address").is_err());
        assert!(TokenAddress::new("0x1234").is_err());
        assert!(TokenAddress::new("0xzz00000000000000000000000000000000000006").is_err());
    }

    #[test]
    fn test_snapshot_verified_defaults_unknown() {
        let snap = TokenSnapshot::new(0.5, 120);
        assert!(snap.verified.is_none());
        let snap = snap.with_verified(true);
        assert_eq!(snap.verified, Some(true));
    }
}
