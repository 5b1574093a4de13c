//! JSON-RPC ledger client
//!
//! Speaks JSON-RPC 2.0 over HTTP with Ethereum-compatible method names.
//! Quantities travel as `0x`-prefixed hex strings.

use crate::{
    chain::{LedgerClient, SignedTransfer, TxState},
    Error, Result,
};
use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<serde_json::Value>,
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Transaction view; only inclusion matters here
#[derive(Debug, Deserialize)]
struct TransactionView {
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
}

/// Ledger client over HTTP JSON-RPC
pub struct JsonRpcLedgerClient {
    endpoint: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl std::fmt::Debug for JsonRpcLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcLedgerClient")
            .field("endpoint", &self.endpoint)
            .field("client", &"reqwest::Client")
            .finish()
    }
}

impl JsonRpcLedgerClient {
    /// Create a client for `endpoint`
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::ChainQuery(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: JsonRpcResponse<T> = response.json().await?;
        interpret(method, body)
    }

    async fn call_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        self.call(method, params)
            .await?
            .ok_or_else(|| Error::ChainQuery(format!("{} returned no result", method)))
    }
}

fn interpret<T>(method: &str, body: JsonRpcResponse<T>) -> Result<Option<T>> {
    if let Some(err) = body.error {
        return Err(Error::ChainQuery(format!(
            "{} failed ({}): {}",
            method, err.code, err.message
        )));
    }
    Ok(body.result)
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(value: &str) -> Result<BigUint> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| Error::ChainQuery(format!("quantity without 0x prefix: {}", value)))?;

    if digits.is_empty() {
        return Ok(BigUint::default());
    }

    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| Error::ChainQuery(format!("invalid hex quantity: {}", value)))
}

fn tx_state(view: Option<TransactionView>) -> TxState {
    match view {
        None => TxState::NotFound,
        Some(TransactionView { block_number: None }) => TxState::Pending,
        Some(_) => TxState::Settled,
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn balance(&self, address: &str) -> Result<BigUint> {
        let raw: String = self
            .call_required("eth_getBalance", vec![address.into(), "latest".into()])
            .await?;
        parse_quantity(&raw)
    }

    async fn account_nonce(&self, address: &str) -> Result<u64> {
        let raw: String = self
            .call_required("eth_getTransactionCount", vec![address.into(), "latest".into()])
            .await?;
        parse_quantity(&raw)?
            .to_u64()
            .ok_or_else(|| Error::ChainQuery(format!("nonce out of range: {}", raw)))
    }

    async fn suggest_fee_price(&self) -> Result<BigUint> {
        let raw: String = self.call_required("eth_gasPrice", Vec::new()).await?;
        parse_quantity(&raw)
    }

    async fn transaction_state(&self, tx_id: &str) -> Result<TxState> {
        let view: Option<TransactionView> = self
            .call("eth_getTransactionByHash", vec![tx_id.into()])
            .await?;
        Ok(tx_state(view))
    }

    async fn broadcast(&self, transfer: &SignedTransfer) -> Result<String> {
        let raw = format!("0x{}", hex::encode(&transfer.raw));
        self.call_required("eth_sendRawTransaction", vec![raw.into()])
            .await
    }
}
