//! The injected EIP-1193 wallet provider, seen from the page context.

pub mod client;

pub use client::{TxLog, TxReceipt, WalletClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Anything that answers EIP-1193 `request({ method, params })` calls.
///
/// In a browser this is `window.ethereum`. Natively it can be a JSON-RPC
/// node (read-only) or a scripted test wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

/// An EIP-1193 `ProviderRpcError`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    pub const INTERNAL: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == Self::USER_REJECTED
            || self.message.to_lowercase().contains("user rejected")
    }

    /// `wallet_switchEthereumChain` on a chain the wallet hasn't added.
    /// MetaMask mobile wraps the code as `data.originalError.code`.
    pub fn is_unrecognized_chain(&self) -> bool {
        if self.code == Self::UNRECOGNIZED_CHAIN {
            return true;
        }
        self.data
            .as_ref()
            .and_then(|data| data.pointer("/originalError/code"))
            .and_then(Value::as_i64)
            == Some(Self::UNRECOGNIZED_CHAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unrecognized_chain_nested_code() {
        assert!(ProviderError::new(4902, "Unrecognized chain ID").is_unrecognized_chain());

        let nested = ProviderError::new(ProviderError::INTERNAL, "Internal error")
            .with_data(json!({ "originalError": { "code": 4902 } }));
        assert!(nested.is_unrecognized_chain());

        assert!(!ProviderError::new(4001, "User rejected").is_unrecognized_chain());
    }

    #[test]
    fn test_rejection_by_message() {
        let err = ProviderError::new(-32000, "MetaMask Tx Signature: User rejected the transaction");
        assert!(err.is_user_rejection());
    }

    #[test]
    fn test_provider_error_deserializes_from_js_shape() {
        let err: ProviderError =
            serde_json::from_value(json!({ "code": 4001, "message": "User denied" })).unwrap();
        assert_eq!(err, ProviderError::new(4001, "User denied"));
    }
}
