//! Ethereum JSON-RPC chain reader.
//!
//! Talks to a plain JSON-RPC endpoint: `eth_chainId` for connectivity,
//! `eth_getBalance` for the native token, and an ERC-20 `balanceOf`
//! `eth_call` for GLM. An RPC node holds no accounts, so the watched
//! address is configured, not discovered.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ChainError;
use crate::flow::{ChainContextUpdate, TokenBalance};

use super::networks;
use super::ChainProvider;

/// `balanceOf(address)` selector.
const BALANCE_OF_SELECTOR: &str = "70a08231";

/// JSON-RPC implementation of [`ChainProvider`].
pub struct JsonRpcChain {
    client: reqwest::Client,
    url: String,
    address: Option<String>,
}

impl JsonRpcChain {
    pub fn new(url: impl Into<String>, address: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            address,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Request(format!("{method}: {e}")))?
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(error) = response.get("error") {
            return Err(ChainError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: missing result")))
    }

    async fn call_quantity(&self, method: &str, params: Value) -> Result<u128, ChainError> {
        let result = self.call(method, params).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: non-string result")))?;
        parse_hex_quantity(hex)
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: bad quantity {hex}")))
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        let quantity = self.call_quantity("eth_chainId", json!([])).await?;
        u64::try_from(quantity)
            .map_err(|_| ChainError::InvalidResponse(format!("chain id out of range: {quantity}")))
    }

    async fn native_balance(&self, address: &str) -> Result<u128, ChainError> {
        self.call_quantity("eth_getBalance", json!([address, "latest"]))
            .await
    }

    async fn glm_balance(&self, address: &str, contract: &str) -> Result<u128, ChainError> {
        let data = balance_of_calldata(address)
            .ok_or_else(|| ChainError::InvalidResponse(format!("bad address: {address}")))?;
        self.call_quantity("eth_call", json!([{"to": contract, "data": data}, "latest"]))
            .await
    }
}

#[async_trait]
impl ChainProvider for JsonRpcChain {
    async fn fetch(&self) -> Result<ChainContextUpdate, ChainError> {
        let chain_id = self.chain_id().await?;
        let mut update = ChainContextUpdate {
            chain_id: Some(chain_id),
            address: self.address.clone(),
            balance: None,
        };

        let Some(address) = self.address.as_deref() else {
            return Ok(update);
        };
        let Some(network) = networks::by_chain_id(chain_id) else {
            debug!(chain_id, "chain not supported, skipping balance fetch");
            return Ok(update);
        };

        let native = self.native_balance(address).await?;
        let glm = self.glm_balance(address, network.glm_contract).await?;
        update.balance = Some(TokenBalance { glm, native });
        Ok(update)
    }
}

/// Parse a `0x`-prefixed hex quantity.
fn parse_hex_quantity(hex: &str) -> Option<u128> {
    let digits = hex.strip_prefix("0x")?;
    if digits.is_empty() {
        return None;
    }
    u128::from_str_radix(digits, 16).ok()
}

/// Build `balanceOf(address)` calldata: selector + 32-byte-padded address.
fn balance_of_calldata(address: &str) -> Option<String> {
    let hex = address.strip_prefix("0x")?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!(
        "0x{BALANCE_OF_SELECTOR}{:0>64}",
        hex.to_ascii_lowercase()
    ))
}
