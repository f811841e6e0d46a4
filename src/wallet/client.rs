use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use serde_json::{json, Value};

use super::{ProviderError, WalletProvider};
use crate::config::NetworkConfig;
use crate::error::BridgeError;

/// A log entry from a transaction receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct TxLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    /// 1 on success, 0 on revert
    pub status: u64,
    pub logs: Vec<TxLog>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }

    fn from_json(value: &Value) -> Result<Self, String> {
        let transaction_hash = value
            .get("transactionHash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let block_number = match value.get("blockNumber") {
            Some(Value::Null) | None => None,
            Some(v) => Some(quantity_to_u64(v)?),
        };
        // Pre-byzantium receipts have no status; treat them as successful
        let status = match value.get("status") {
            Some(Value::Null) | None => 1,
            Some(v) => quantity_to_u64(v)?,
        };

        let mut logs = Vec::new();
        if let Some(entries) = value.get("logs").and_then(Value::as_array) {
            for entry in entries {
                logs.push(TxLog::from_json(entry)?);
            }
        }

        Ok(Self {
            transaction_hash,
            block_number,
            status,
            logs,
        })
    }
}

impl TxLog {
    fn from_json(value: &Value) -> Result<Self, String> {
        let address = value
            .get("address")
            .and_then(Value::as_str)
            .ok_or("log without address")?
            .parse::<Address>()
            .map_err(|e| format!("invalid log address: {}", e))?;
        let topics = value
            .get("topics")
            .and_then(Value::as_array)
            .map(|topics| {
                topics
                    .iter()
                    .map(|t| {
                        t.as_str()
                            .ok_or_else(|| "non-string topic".to_string())?
                            .parse::<B256>()
                            .map_err(|e| format!("invalid topic: {}", e))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        let data = value
            .get("data")
            .and_then(Value::as_str)
            .map(decode_hex)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            address,
            topics,
            data: Bytes::from(data),
        })
    }
}

/// Typed wrapper over an EIP-1193 provider.
#[derive(Clone)]
pub struct WalletClient {
    provider: Arc<dyn WalletProvider>,
}

impl WalletClient {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self { provider }
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        log::debug!("[Wallet] {} {}", method, params);
        self.provider.request(method, params).await
    }

    /// Accounts already authorized for this page. Never prompts.
    pub async fn accounts(&self) -> Result<Vec<String>, BridgeError> {
        let value = self.request("eth_accounts", json!([])).await?;
        Ok(parse_accounts(&value))
    }

    /// May open the wallet's connect prompt.
    pub async fn request_accounts(&self) -> Result<Vec<String>, BridgeError> {
        let value = self.request("eth_requestAccounts", json!([])).await?;
        Ok(parse_accounts(&value))
    }

    pub async fn chain_id(&self) -> Result<u64, BridgeError> {
        let value = self.request("eth_chainId", json!([])).await?;
        quantity_to_u64(&value).map_err(|e| BridgeError::Provider {
            code: ProviderError::INTERNAL,
            message: format!("Invalid eth_chainId response: {}", e),
        })
    }

    /// Native balance in wei.
    pub async fn balance(&self, account: Address) -> Result<U256, BridgeError> {
        let value = self
            .request("eth_getBalance", json!([account.to_string(), "latest"]))
            .await?;
        parse_quantity(&value).map_err(|e| BridgeError::Provider {
            code: ProviderError::INTERNAL,
            message: format!("Invalid eth_getBalance response: {}", e),
        })
    }

    /// Read-only contract call with typed return decoding.
    pub async fn call<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return, BridgeError> {
        let params = json!([
            { "to": to.to_string(), "data": format!("0x{}", hex::encode(call.abi_encode())) },
            "latest"
        ]);
        let value = self.request("eth_call", params).await.map_err(|e| {
            BridgeError::ContractCall(format!("{} on {}: {}", C::SIGNATURE, to, e.message))
        })?;

        let data = value
            .as_str()
            .ok_or_else(|| BridgeError::ContractCall(format!("{}: non-string result", C::SIGNATURE)))
            .and_then(|s| decode_hex(s).map_err(BridgeError::ContractCall))?;

        C::abi_decode_returns(&data, true)
            .map_err(|e| BridgeError::ContractCall(format!("{}: {}", C::SIGNATURE, e)))
    }

    /// Submits a state-changing call. Returns the transaction hash.
    pub async fn send_transaction<C: SolCall>(
        &self,
        from: Address,
        to: Address,
        call: &C,
    ) -> Result<String, BridgeError> {
        let params = json!([{
            "from": from.to_string(),
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(call.abi_encode())),
        }]);
        let value = self.request("eth_sendTransaction", params).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BridgeError::Provider {
                code: ProviderError::INTERNAL,
                message: "eth_sendTransaction returned no hash".to_string(),
            })
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, BridgeError> {
        let value = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        TxReceipt::from_json(&value)
            .map(Some)
            .map_err(|e| BridgeError::Provider {
                code: ProviderError::INTERNAL,
                message: format!("Invalid receipt for {}: {}", tx_hash, e),
            })
    }

    /// Polls for a receipt every `interval`, at most `attempts` times.
    /// Provider errors while polling are logged and retried.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        interval: Duration,
        attempts: u32,
    ) -> Option<TxReceipt> {
        for attempt in 1..=attempts {
            match self.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Some(receipt),
                Ok(None) => {}
                Err(e) => log::warn!("[Wallet] Receipt poll {} for {} failed: {}", attempt, tx_hash, e),
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        None
    }

    pub async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        self.request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format!("{:#x}", chain_id) }]),
        )
        .await
        .map(|_| ())
    }

    pub async fn add_chain(&self, network: &NetworkConfig) -> Result<(), ProviderError> {
        self.request("wallet_addEthereumChain", json!([network.add_chain_params()]))
            .await
            .map(|_| ())
    }
}

fn parse_accounts(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|accounts| {
            accounts
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Reads an Ethereum JSON-RPC quantity. "0x" is zero.
pub fn parse_quantity(value: &Value) -> Result<U256, String> {
    match value {
        Value::String(s) => {
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .ok_or_else(|| format!("quantity without 0x prefix: {}", s))?;
            if digits.is_empty() {
                return Ok(U256::ZERO);
            }
            U256::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {}: {}", s, e))
        }
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("invalid quantity {}", n)),
        other => Err(format!("invalid quantity {}", other)),
    }
}

fn quantity_to_u64(value: &Value) -> Result<u64, String> {
    let quantity = parse_quantity(value)?;
    u64::try_from(quantity).map_err(|_| format!("quantity {} does not fit in u64", quantity))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| format!("invalid hex data: {}", e))
}
