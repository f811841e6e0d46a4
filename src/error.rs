use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::AmountError;
use crate::wallet::ProviderError;

/// Machine-readable error kind carried across the message channel next to the
/// human-readable error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unavailable,
    NotConnected,
    UserRejected,
    WrongNetwork,
    InsufficientBalance,
    InsufficientGas,
    ApprovalFailed,
    ApprovalTimeout,
    TransferFailed,
    TransferTimeout,
    ContractCallError,
    BridgeTimeout,
    NoActiveTab,
    InjectionFailed,
    UnsupportedToken,
    UnknownNetwork,
    InvalidAmount,
    InvalidRequest,
    ProviderError,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("No wallet provider detected. Please install MetaMask.")]
    Unavailable,

    #[error("{0}")]
    NotConnected(String),

    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("Wrong network: wallet is on chain {actual}, payment requires {expected_name} (chain {expected}). Switch networks and try again.")]
    WrongNetwork {
        expected: u64,
        expected_name: String,
        actual: u64,
    },

    #[error("Insufficient {symbol} balance. You have {available} {symbol} but need {required} {symbol}")]
    InsufficientBalance {
        symbol: String,
        available: String,
        required: String,
    },

    #[error("Insufficient funds for gas fees. {0}")]
    InsufficientGas(String),

    #[error("Token approval failed: {0}")]
    ApprovalFailed(String),

    #[error("Token approval {tx_hash} was not confirmed in time; it may still be pending")]
    ApprovalTimeout { tx_hash: String },

    #[error("Payment transfer failed: {0}")]
    TransferFailed(String),

    #[error("Payment transfer {tx_hash} was not confirmed in time; it may still be pending")]
    TransferTimeout { tx_hash: String },

    #[error("Contract call failed: {0}")]
    ContractCall(String),

    #[error("Wallet operation {action} timed out after {after_ms}ms")]
    BridgeTimeout { action: String, after_ms: u64 },

    #[error("No active tab available")]
    NoActiveTab,

    #[error("Could not reach the wallet bridge: {0}")]
    InjectionFailed(String),

    #[error("Token {symbol} not supported on network {chain_id}")]
    UnsupportedToken { symbol: String, chain_id: u64 },

    #[error("Network {0} is not configured")]
    UnknownNetwork(u64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Wallet provider error {code}: {message}")]
    Provider { code: i64, message: String },

    /// An error that crossed the message channel and was rebuilt from its
    /// wire form.
    #[error("{message}")]
    Remote { code: ErrorCode, message: String },
}

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::Unavailable => ErrorCode::Unavailable,
            BridgeError::NotConnected(_) => ErrorCode::NotConnected,
            BridgeError::UserRejected(_) => ErrorCode::UserRejected,
            BridgeError::WrongNetwork { .. } => ErrorCode::WrongNetwork,
            BridgeError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            BridgeError::InsufficientGas(_) => ErrorCode::InsufficientGas,
            BridgeError::ApprovalFailed(_) => ErrorCode::ApprovalFailed,
            BridgeError::ApprovalTimeout { .. } => ErrorCode::ApprovalTimeout,
            BridgeError::TransferFailed(_) => ErrorCode::TransferFailed,
            BridgeError::TransferTimeout { .. } => ErrorCode::TransferTimeout,
            BridgeError::ContractCall(_) => ErrorCode::ContractCallError,
            BridgeError::BridgeTimeout { .. } => ErrorCode::BridgeTimeout,
            BridgeError::NoActiveTab => ErrorCode::NoActiveTab,
            BridgeError::InjectionFailed(_) => ErrorCode::InjectionFailed,
            BridgeError::UnsupportedToken { .. } => ErrorCode::UnsupportedToken,
            BridgeError::UnknownNetwork(_) => ErrorCode::UnknownNetwork,
            BridgeError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            BridgeError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            BridgeError::Provider { .. } => ErrorCode::ProviderError,
            BridgeError::Remote { code, .. } => *code,
        }
    }

    /// Timeouts on-chain don't mean the transaction failed, only that we
    /// stopped watching it.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::ApprovalTimeout | ErrorCode::TransferTimeout
        )
    }

    pub fn from_wire(code: Option<ErrorCode>, message: impl Into<String>) -> Self {
        BridgeError::Remote {
            code: code.unwrap_or(ErrorCode::ProviderError),
            message: message.into(),
        }
    }
}

impl From<ProviderError> for BridgeError {
    fn from(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            return BridgeError::UserRejected(err.message);
        }
        if err.message.to_lowercase().contains("insufficient funds") {
            return BridgeError::InsufficientGas(
                "Please add more native currency to your wallet.".to_string(),
            );
        }
        BridgeError::Provider {
            code: err.code,
            message: err.message,
        }
    }
}

impl From<AmountError> for BridgeError {
    fn from(err: AmountError) -> Self {
        BridgeError::InvalidAmount(err.to_string())
    }
}
