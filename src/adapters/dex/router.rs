//! V2-style DEX venue adapters
//!
//! BaseSwap, the Uniswap v2 deployment on Base, and Camelot all expose the
//! same router interface, so one adapter parameterized by a [`VenueSpec`]
//! covers every configured venue. Quotes go through `getAmountsOut` on a
//! USDC-quoted path; swaps through `swapExactTokensForTokens` submitted by
//! the node-managed wallet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::domain::{Side, TokenAddress, TradeOrder};
use crate::ports::{DexAdapter, DexError, Quote, SwapBounds};

use super::super::evm::client::{to_hex, EvmClient, EvmError, TxRequest};
use super::super::evm::feed::WETH_ADDRESS;
use super::calldata::{decode_last_array_u256, CalldataBuilder};

/// Native USDC on Base, the quote currency for every path.
pub const USDC_ADDRESS: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";

/// getAmountsOut(uint256,address[])
const GET_AMOUNTS_OUT: &str = "0xd06ca61f";
/// swapExactTokensForTokens(uint256,uint256,address[],address,uint256)
const SWAP_EXACT_TOKENS: &str = "0x38ed1739";

const USDC_UNIT: f64 = 1e6;
const TOKEN_UNIT: f64 = 1e18;

/// One venue's identity: config name, deployed router, LP fee.
#[derive(Debug, Clone)]
pub struct VenueSpec {
    pub name: &'static str,
    pub router: &'static str,
    pub fee_bps: u32,
    /// Typical gas for a two-hop v2 swap on this venue.
    pub gas_estimate: u64,
}

impl VenueSpec {
    /// Look up a venue by its config name.
    pub fn for_name(name: &str) -> Option<VenueSpec> {
        const VENUES: &[VenueSpec] = &[
            VenueSpec {
                name: "uniswap_v3",
                router: "0x4752ba5dbc23f44d87826276bf6fd6b1c372ad24",
                fee_bps: 30,
                gas_estimate: 180_000,
            },
            VenueSpec {
                name: "baseswap",
                router: "0x327df1e6de05895d2ab08513aadd9313fe505d86",
                fee_bps: 25,
                gas_estimate: 170_000,
            },
            VenueSpec {
                name: "camelot",
                router: "0xc873fecbd354f5a56e00e710b90ef4201db2448d",
                fee_bps: 30,
                gas_estimate: 190_000,
            },
        ];
        VENUES.iter().find(|v| v.name == name).cloned()
    }
}

/// V2-router venue adapter.
pub struct RouterAdapter {
    spec: VenueSpec,
    client: Arc<EvmClient>,
    receipt_deadline: Duration,
}

impl RouterAdapter {
    pub fn new(spec: VenueSpec, client: Arc<EvmClient>, receipt_deadline: Duration) -> Self {
        Self {
            spec,
            client,
            receipt_deadline,
        }
    }

    /// Path through WETH; every pool the sniper touches is ETH-quoted.
    fn path(&self, token: &TokenAddress, side: Side) -> [String; 3] {
        match side {
            Side::Buy => [
                USDC_ADDRESS.to_string(),
                WETH_ADDRESS.to_string(),
                token.as_str().to_string(),
            ],
            Side::Sell => [
                token.as_str().to_string(),
                WETH_ADDRESS.to_string(),
                USDC_ADDRESS.to_string(),
            ],
        }
    }

    fn amounts_out_call(&self, amount_in: u128, path: &[String; 3]) -> String {
        CalldataBuilder::new(GET_AMOUNTS_OUT)
            .push_u256(amount_in)
            .push_address_array(&[&path[0], &path[1], &path[2]])
            .build()
    }

    fn map_send_error(&self, err: EvmError, bounds: &SwapBounds) -> DexError {
        match err {
            EvmError::NodeError { message, .. } if message.to_lowercase().contains("nonce") => {
                DexError::NonceConflict {
                    expected: bounds.nonce,
                }
            }
            EvmError::NodeError { message, .. } => DexError::Reverted {
                venue: self.spec.name.to_string(),
                reason: message,
            },
            EvmError::ReceiptTimeout(_) => DexError::Timeout {
                venue: self.spec.name.to_string(),
            },
            other => DexError::Rpc(other.to_string()),
        }
    }
}

#[async_trait]
impl DexAdapter for RouterAdapter {
    fn name(&self) -> &str {
        self.spec.name
    }

    async fn quote(
        &self,
        token: &TokenAddress,
        side: Side,
        amount: f64,
    ) -> Result<Quote, DexError> {
        let (amount_in_raw, in_usd) = match side {
            Side::Buy => ((amount * USDC_UNIT) as u128, amount),
            Side::Sell => ((amount * TOKEN_UNIT) as u128, 0.0),
        };
        if amount_in_raw == 0 {
            return Err(DexError::NoRoute {
                venue: self.spec.name.to_string(),
                token: token.clone(),
            });
        }
        let path = self.path(token, side);
        let data = self.amounts_out_call(amount_in_raw, &path);
        let ret = self
            .client
            .call(self.spec.router, &data)
            .await
            .map_err(|e| match e {
                // Routers revert getAmountsOut when a hop has no pool.
                EvmError::NodeError { .. } => DexError::NoRoute {
                    venue: self.spec.name.to_string(),
                    token: token.clone(),
                },
                other => DexError::Rpc(other.to_string()),
            })?;
        let out_raw = decode_last_array_u256(&ret).map_err(|e| DexError::Rpc(e.to_string()))?;

        let (amount_out, price_usd) = match side {
            Side::Buy => {
                let tokens = out_raw as f64 / TOKEN_UNIT;
                if tokens <= 0.0 {
                    return Err(DexError::NoRoute {
                        venue: self.spec.name.to_string(),
                        token: token.clone(),
                    });
                }
                (tokens, in_usd / tokens)
            }
            Side::Sell => {
                let usd = out_raw as f64 / USDC_UNIT;
                (usd, usd / amount)
            }
        };
        debug!(
            venue = self.spec.name,
            %token,
            ?side,
            amount_out,
            price_usd,
            "Quote"
        );
        Ok(Quote {
            venue: self.spec.name.to_string(),
            price_usd,
            amount_out,
            fee_bps: self.spec.fee_bps,
            gas_estimate: self.spec.gas_estimate,
        })
    }

    async fn swap(&self, order: &TradeOrder, bounds: SwapBounds) -> Result<String, DexError> {
        let path = self.path(&order.token.address, order.side);
        let (amount_in_raw, min_out_raw) = match order.side {
            Side::Buy => {
                let usd = order.notional_usd.to_f64().unwrap_or(0.0);
                (
                    (usd * USDC_UNIT) as u128,
                    (bounds.min_amount_out * TOKEN_UNIT) as u128,
                )
            }
            Side::Sell => (
                (order.quantity * TOKEN_UNIT) as u128,
                (bounds.min_amount_out * USDC_UNIT) as u128,
            ),
        };
        let data = CalldataBuilder::new(SWAP_EXACT_TOKENS)
            .push_u256(amount_in_raw)
            .push_u256(min_out_raw)
            .push_address_array(&[&path[0], &path[1], &path[2]])
            .push_address(self.client.wallet_address())
            .push_u256(order.deadline.timestamp().max(0) as u128)
            .build();

        let tx = TxRequest {
            from: self.client.wallet_address().to_string(),
            to: self.spec.router.to_string(),
            data,
            value: None,
            gas: None,
            gas_price: Some(to_hex(bounds.gas_price_gwei * 1_000_000_000)),
            nonce: Some(to_hex(bounds.nonce)),
        };
        let hash = self
            .client
            .send_transaction(&tx)
            .await
            .map_err(|e| self.map_send_error(e, &bounds))?;

        let receipt = self
            .client
            .wait_for_receipt(&hash, self.receipt_deadline)
            .await
            .map_err(|e| self.map_send_error(e, &bounds))?;
        if !receipt.succeeded() {
            return Err(DexError::Reverted {
                venue: self.spec.name.to_string(),
                reason: format!("tx {} reverted on-chain", hash),
            });
        }
        Ok(hash)
    }
}

/// Instantiate the configured venues, skipping unknown names with a log.
pub fn build_venues(
    names: &[String],
    client: &Arc<EvmClient>,
    receipt_deadline: Duration,
) -> Vec<Arc<dyn DexAdapter>> {
    names
        .iter()
        .filter_map(|name| match VenueSpec::for_name(name) {
            Some(spec) => Some(Arc::new(RouterAdapter::new(
                spec,
                Arc::clone(client),
                receipt_deadline,
            )) as Arc<dyn DexAdapter>),
            None => {
                tracing::warn!(venue = %name, "Unknown venue in config, skipping");
                None
            }
        })
        .collect()
}
