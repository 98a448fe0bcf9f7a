//! Execution Router
//!
//! Quotes every configured venue concurrently, ranks them by output net of
//! fees, and walks the ranking submitting until one fills. Slippage and gas
//! bounds are derived from the winning quote; the nonce lease is held across
//! each submission so no two in-flight transactions can collide.
//!
//! The router never touches the ledger or the position book. A returned
//! `Fill` is the caller's cue to commit capital; any error leaves chain
//! state untouched from the caller's perspective.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Fill, OrderId, Side, TradeOrder};
use crate::ports::{DexAdapter, DexError, Quote, SwapBounds};

use super::nonce::{NonceError, NonceManager, WalletChain};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Order {0} expired before submission")]
    Expired(OrderId),

    #[error("No venue quoted order {0}")]
    NoQuotes(OrderId),

    #[error("All routes exhausted for order {order_id} after {attempts} attempts")]
    AllRoutesExhausted { order_id: OrderId, attempts: usize },

    #[error(transparent)]
    Nonce(#[from] NonceError),
}

pub struct RouterSettings {
    pub slippage_tolerance: f64,
    pub max_gas_price_gwei: u64,
    pub max_nonce_retries: u32,
}

pub struct ExecutionRouter {
    adapters: Vec<Arc<dyn DexAdapter>>,
    chain: Arc<dyn WalletChain>,
    nonces: NonceManager,
    settings: RouterSettings,
}

impl ExecutionRouter {
    pub fn new(
        adapters: Vec<Arc<dyn DexAdapter>>,
        chain: Arc<dyn WalletChain>,
        settings: RouterSettings,
    ) -> Self {
        let nonces = NonceManager::new(chain.clone());
        Self {
            adapters,
            chain,
            nonces,
            settings,
        }
    }

    /// Route one order to a fill, falling back across venues on failure.
    pub async fn execute(&self, order: &TradeOrder) -> Result<Fill, ExecutionError> {
        if order.is_expired() {
            return Err(ExecutionError::Expired(order.id));
        }

        let ranked = self.ranked_quotes(order).await;
        if ranked.is_empty() {
            return Err(ExecutionError::NoQuotes(order.id));
        }

        let gas_price_gwei = self.bounded_gas_price(order).await?;
        let mut attempts = 0;

        for (adapter, quote) in &ranked {
            // An order can outlive a slow earlier attempt.
            if order.is_expired() {
                return Err(ExecutionError::Expired(order.id));
            }
            attempts += 1;
            match self
                .submit_on(adapter.as_ref(), order, quote, gas_price_gwei)
                .await
            {
                Ok(tx_hash) => {
                    info!(
                        order_id = %order.id,
                        venue = quote.venue,
                        tx_hash,
                        price = quote.price_usd,
                        "order filled"
                    );
                    return Ok(self.fill_from(order, quote, tx_hash));
                }
                Err(err) => {
                    warn!(
                        order_id = %order.id,
                        venue = quote.venue,
                        %err,
                        "venue failed, trying next route"
                    );
                }
            }
        }

        Err(ExecutionError::AllRoutesExhausted {
            order_id: order.id,
            attempts,
        })
    }

    /// Concurrent quotes from every venue, best net output first.
    async fn ranked_quotes(&self, order: &TradeOrder) -> Vec<(Arc<dyn DexAdapter>, Quote)> {
        let amount = match order.side {
            Side::Buy => decimal_to_f64(order.notional_usd),
            Side::Sell => order.quantity,
        };
        self.rank(&order.token.address, order.side, amount).await
    }

    /// Best available quote for an amount, used for mark-to-market pricing.
    pub async fn best_quote(
        &self,
        token: &crate::domain::TokenAddress,
        side: Side,
        amount: f64,
    ) -> Option<Quote> {
        self.rank(token, side, amount)
            .await
            .into_iter()
            .next()
            .map(|(_, quote)| quote)
    }

    async fn rank(
        &self,
        token: &crate::domain::TokenAddress,
        side: Side,
        amount: f64,
    ) -> Vec<(Arc<dyn DexAdapter>, Quote)> {
        let futures = self
            .adapters
            .iter()
            .map(|a| async move { (a.clone(), a.quote(token, side, amount).await) });
        let mut quotes: Vec<(Arc<dyn DexAdapter>, Quote)> = join_all(futures)
            .await
            .into_iter()
            .filter_map(|(adapter, result)| match result {
                Ok(quote) => Some((adapter, quote)),
                Err(err) => {
                    debug!(%token, %err, "venue declined to quote");
                    None
                }
            })
            .collect();
        quotes.sort_by(|a, b| {
            b.1.net_amount_out()
                .partial_cmp(&a.1.net_amount_out())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        quotes
    }

    /// Node estimate with 10% headroom, capped by both the global and the
    /// per-order gas ceiling.
    async fn bounded_gas_price(&self, order: &TradeOrder) -> Result<u64, NonceError> {
        let estimate = self.chain.gas_price_gwei().await?;
        let with_headroom = estimate + estimate / 10;
        Ok(with_headroom
            .min(self.settings.max_gas_price_gwei)
            .min(order.max_gas_price_gwei))
    }

    /// One venue submission under the nonce lease, with bounded resubmits
    /// on a stale nonce.
    async fn submit_on(
        &self,
        adapter: &dyn DexAdapter,
        order: &TradeOrder,
        quote: &Quote,
        gas_price_gwei: u64,
    ) -> Result<String, DexError> {
        let min_amount_out = quote.net_amount_out() * (1.0 - self.settings.slippage_tolerance);
        let mut lease = self.nonces.lease().await;
        let mut tries = 0;
        loop {
            let nonce = lease
                .nonce()
                .await
                .map_err(|e| DexError::Rpc(e.to_string()))?;
            let bounds = SwapBounds {
                min_amount_out,
                gas_price_gwei,
                nonce,
            };
            match adapter.swap(order, bounds).await {
                Ok(tx_hash) => {
                    lease.advance();
                    return Ok(tx_hash);
                }
                Err(DexError::NonceConflict { expected }) => {
                    lease.invalidate();
                    tries += 1;
                    if tries > self.settings.max_nonce_retries {
                        return Err(DexError::NonceConflict { expected });
                    }
                    debug!(order_id = %order.id, tries, "nonce conflict, resubmitting");
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn fill_from(&self, order: &TradeOrder, quote: &Quote, tx_hash: String) -> Fill {
        let quantity = match order.side {
            Side::Buy => quote.amount_out,
            Side::Sell => order.quantity,
        };
        Fill {
            order_id: order.id,
            tx_hash,
            venue: quote.venue.clone(),
            price_usd: quote.price_usd,
            quantity,
            gas_used: quote.gas_estimate,
            filled_at: chrono::Utc::now(),
        }
    }
}

fn decimal_to_f64(value: rust_decimal::Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}
