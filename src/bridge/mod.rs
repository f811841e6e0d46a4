pub mod agent;
pub mod content;
pub mod local;
pub mod pending;
pub mod protocol;
pub mod relay;

pub use agent::BridgeAgent;
pub use content::{ContentRelay, PageContext};
pub use local::{LocalPage, LocalTabs};
pub use pending::PendingRequests;
pub use protocol::{
    BridgeRequest, BridgeResponse, ExtensionMessage, NetworkInfo, NetworkSwitch, ProductData,
    RelayRequest, RequestId, TabId, TokenBalance, TokenBalances, WalletAction, WalletOperation,
    WalletStatus,
};
pub use relay::{DeliveryError, TabMessenger, WalletRelay};
