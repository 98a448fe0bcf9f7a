//! Base JSON-RPC client
//!
//! Minimal EVM node client over reqwest. Covers exactly the calls the
//! engine needs: block/log reads for the monitor, gas and nonce reads for
//! the router, and transaction submission for the DEX adapters. The node
//! holds the wallet key; signing happens server-side via
//! `eth_sendTransaction`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::execution::{NonceError, WalletChain};

#[derive(Debug, Error)]
pub enum EvmError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Node returned error {code}: {message}")]
    NodeError { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    MalformedResponse(String),

    #[error("Invalid hex value: {0}")]
    HexError(String),

    #[error("Timeout waiting for receipt of {0}")]
    ReceiptTimeout(String),
}

/// EVM client configuration
#[derive(Debug, Clone)]
pub struct EvmConfig {
    pub rpc_url: String,
    /// Wallet whose nonce and balance this client reports
    pub wallet_address: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// One entry from `eth_getLogs`. Quantity fields stay hex-encoded on the
/// wire; accessors decode them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    pub transaction_hash: String,
    pub log_index: String,
}

impl LogEntry {
    pub fn block_number(&self) -> Result<u64, EvmError> {
        parse_hex_u64(&self.block_number)
    }

    pub fn log_index(&self) -> Result<u64, EvmError> {
        parse_hex_u64(&self.log_index)
    }
}

/// `eth_sendTransaction` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub from: String,
    pub to: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub status: String,
    pub gas_used: String,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == "0x1"
    }

    pub fn gas_used(&self) -> Result<u64, EvmError> {
        parse_hex_u64(&self.gas_used)
    }
}

/// JSON-RPC client for a Base node
#[derive(Debug)]
pub struct EvmClient {
    config: EvmConfig,
    http: Client,
    next_id: AtomicU64,
}

impl EvmClient {
    pub fn new(config: EvmConfig) -> Result<Self, EvmError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EvmError::HttpError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn wallet_address(&self) -> &str {
        &self.config.wallet_address
    }

    /// Single JSON-RPC call with retry on transport and server errors.
    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, EvmError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let mut last_error = None;
        for attempt in 0..self.config.max_retries.max(1) {
            let sent = self
                .http
                .post(&self.config.rpc_url)
                .json(&body)
                .send()
                .await;
            match sent {
                Ok(response) if response.status().is_server_error() => {
                    last_error = Some(EvmError::HttpError(format!(
                        "Server error: {}",
                        response.status()
                    )));
                }
                Ok(response) => {
                    let parsed: RpcResponse<T> = response
                        .json()
                        .await
                        .map_err(|e| EvmError::MalformedResponse(e.to_string()))?;
                    if let Some(err) = parsed.error {
                        return Err(EvmError::NodeError {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    return parsed.result.ok_or_else(|| {
                        EvmError::MalformedResponse(format!("{method}: empty result"))
                    });
                }
                Err(e) => last_error = Some(EvmError::HttpError(e.to_string())),
            }
            tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
        }
        Err(last_error
            .unwrap_or_else(|| EvmError::HttpError("Max retries exceeded".to_string())))
    }

    pub async fn block_number(&self) -> Result<u64, EvmError> {
        let hex: String = self.rpc("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&hex)
    }

    /// Fetch logs for a block range, optionally filtered by contract and
    /// first topic.
    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Option<&str>,
        topic0: Option<&str>,
    ) -> Result<Vec<LogEntry>, EvmError> {
        let mut filter = json!({
            "fromBlock": to_hex(from_block),
            "toBlock": to_hex(to_block),
        });
        if let Some(address) = address {
            filter["address"] = json!(address);
        }
        if let Some(topic0) = topic0 {
            filter["topics"] = json!([topic0]);
        }
        self.rpc("eth_getLogs", json!([filter])).await
    }

    /// Read-only contract call against latest state. Returns the raw hex
    /// return data.
    pub async fn call(&self, to: &str, data: &str) -> Result<String, EvmError> {
        self.rpc(
            "eth_call",
            json!([{ "to": to, "data": data }, "latest"]),
        )
        .await
    }

    pub async fn gas_price_wei(&self) -> Result<u128, EvmError> {
        let hex: String = self.rpc("eth_gasPrice", json!([])).await?;
        parse_hex_u128(&hex)
    }

    pub async fn transaction_count(&self, address: &str) -> Result<u64, EvmError> {
        let hex: String = self
            .rpc("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_hex_u64(&hex)
    }

    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<String, EvmError> {
        self.rpc("eth_sendTransaction", json!([tx])).await
    }

    pub async fn transaction_receipt(&self, hash: &str) -> Result<Option<TxReceipt>, EvmError> {
        self.rpc("eth_getTransactionReceipt", json!([hash])).await
    }

    /// Poll for a receipt until the deadline, Base blocks land every ~2s.
    pub async fn wait_for_receipt(
        &self,
        hash: &str,
        deadline: Duration,
    ) -> Result<TxReceipt, EvmError> {
        let started = tokio::time::Instant::now();
        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            if started.elapsed() >= deadline {
                return Err(EvmError::ReceiptTimeout(hash.to_string()));
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    /// Wallet balance in ETH.
    pub async fn get_balance(&self, address: &str) -> Result<f64, EvmError> {
        let hex: String = self.rpc("eth_getBalance", json!([address, "latest"])).await?;
        let wei = parse_hex_u128(&hex)?;
        Ok(wei as f64 / 1e18)
    }
}

#[async_trait]
impl WalletChain for EvmClient {
    async fn pending_nonce(&self) -> Result<u64, NonceError> {
        self.transaction_count(&self.config.wallet_address)
            .await
            .map_err(|e| NonceError::Fetch(e.to_string()))
    }

    async fn gas_price_gwei(&self) -> Result<u64, NonceError> {
        let wei = self
            .gas_price_wei()
            .await
            .map_err(|e| NonceError::Fetch(e.to_string()))?;
        Ok((wei / 1_000_000_000) as u64)
    }

    async fn wallet_balance_eth(&self) -> Result<f64, NonceError> {
        self.get_balance(&self.config.wallet_address)
            .await
            .map_err(|e| NonceError::Fetch(e.to_string()))
    }
}

pub fn to_hex(value: u64) -> String {
    format!("{:#x}", value)
}

pub fn parse_hex_u64(hex: &str) -> Result<u64, EvmError> {
    let trimmed = hex.trim_start_matches("0x");
    u64::from_str_radix(trimmed, 16).map_err(|_| EvmError::HexError(hex.to_string()))
}

pub fn parse_hex_u128(hex: &str) -> Result<u128, EvmError> {
    let trimmed = hex.trim_start_matches("0x");
    u128::from_str_radix(trimmed, 16).map_err(|_| EvmError::HexError(hex.to_string()))
}
