use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::NetworkConfig;
use crate::wallet::{ProviderError, WalletProvider};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// Read-only `WalletProvider` backed by an HTTP JSON-RPC node.
///
/// Used to watch confirmations independently of the page's wallet. Methods
/// that need a signer are refused.
pub struct JsonRpcProvider {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// First configured RPC URL of the network.
    pub fn for_network(network: &NetworkConfig) -> Option<Self> {
        network.rpc_urls.first().map(|url| Self::new(url.clone()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

const SIGNER_METHODS: &[&str] = &[
    "eth_requestAccounts",
    "eth_sendTransaction",
    "wallet_switchEthereumChain",
    "wallet_addEthereumChain",
];

#[async_trait]
impl WalletProvider for JsonRpcProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        if SIGNER_METHODS.contains(&method) {
            return Err(ProviderError::new(
                ProviderError::UNSUPPORTED_METHOD,
                format!("{} requires a wallet, not an RPC node", method),
            ));
        }
        if method == "eth_accounts" {
            return Ok(Value::Array(Vec::new()));
        }

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(ProviderError::DISCONNECTED, format!("Failed to send request: {}", e))
            })?;

        if !response.status().is_success() {
            log::warn!("[Rpc] {} returned HTTP {}", method, response.status());
            return Err(ProviderError::new(
                ProviderError::DISCONNECTED,
                format!("RPC error: {}", response.status()),
            ));
        }

        let json: Value = response.json().await.map_err(|e| {
            ProviderError::new(ProviderError::INTERNAL, format!("Failed to parse response: {}", e))
        })?;

        parse_rpc_response(json)
    }
}

/// Splits a JSON-RPC envelope into its result or its error object.
pub fn parse_rpc_response(json: Value) -> Result<Value, ProviderError> {
    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(ProviderError::INTERNAL);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown RPC error")
            .to_string();
        let mut err = ProviderError::new(code, message);
        if let Some(data) = error.get("data") {
            err = err.with_data(data.clone());
        }
        return Err(err);
    }

    match json.get("result") {
        Some(result) => Ok(result.clone()),
        None => Err(ProviderError::new(
            ProviderError::INTERNAL,
            format!("Missing result in response: {}", json),
        )),
    }
}
