//! Cross-context wallet bridge for the Lemo shopping extension.
//!
//! A privileged relay forwards wallet operations to a content script, which
//! posts them on the page window where the bridge agent talks to the
//! injected EIP-1193 provider. Responses come back the same way, correlated
//! by request id.

pub mod amount;
pub mod bridge;
pub mod config;
pub mod contracts;
pub mod error;
pub mod payment;
pub mod receipt;
pub mod rpc;
pub mod wallet;

#[cfg(test)]
mod test_support;

pub use bridge::{BridgeAgent, WalletRelay};
pub use config::BridgeConfig;
pub use error::{BridgeError, ErrorCode};
pub use payment::{PaymentOrchestrator, PaymentResult};
pub use wallet::{ProviderError, WalletClient, WalletProvider};
