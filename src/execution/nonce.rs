//! Wallet nonce serialization.
//!
//! One wallet, many tasks: every submission must observe a fresh nonce and
//! no two submissions may race for the same one. The manager caches the
//! next nonce behind an async mutex; the lease is held across the whole
//! submit, which is exactly the at-most-one-pending-submission guarantee.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Error, Debug)]
pub enum NonceError {
    #[error("Nonce fetch failed: {0}")]
    Fetch(String),
}

/// Chain-side wallet state the engine needs: the pending nonce, the node's
/// current gas price estimate, and the native balance that pays for gas.
#[async_trait]
pub trait WalletChain: Send + Sync {
    async fn pending_nonce(&self) -> Result<u64, NonceError>;

    async fn gas_price_gwei(&self) -> Result<u64, NonceError>;

    async fn wallet_balance_eth(&self) -> Result<f64, NonceError>;
}

pub struct NonceManager {
    chain: Arc<dyn WalletChain>,
    cached: Mutex<Option<u64>>,
}

impl NonceManager {
    pub fn new(chain: Arc<dyn WalletChain>) -> Self {
        Self {
            chain,
            cached: Mutex::new(None),
        }
    }

    /// Lock the wallet for one submission. The returned lease keeps every
    /// other submitter waiting until it is dropped.
    pub async fn lease(&self) -> NonceLease<'_> {
        NonceLease {
            chain: &self.chain,
            slot: self.cached.lock().await,
        }
    }
}

pub struct NonceLease<'a> {
    chain: &'a Arc<dyn WalletChain>,
    slot: MutexGuard<'a, Option<u64>>,
}

impl NonceLease<'_> {
    /// Current nonce, fetched from the chain when nothing is cached.
    pub async fn nonce(&mut self) -> Result<u64, NonceError> {
        if let Some(n) = *self.slot {
            return Ok(n);
        }
        let n = self.chain.pending_nonce().await?;
        *self.slot = Some(n);
        Ok(n)
    }

    /// The submission landed; the next submission uses the next nonce.
    pub fn advance(&mut self) {
        *self.slot = self.slot.map(|n| n + 1);
    }

    /// Cached value proved stale (nonce conflict); refetch next time.
    pub fn invalidate(&mut self) {
        *self.slot = None;
    }
}
