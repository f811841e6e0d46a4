use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use alloy_primitives::U256;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{FILECOIN_CALIBRATION_CHAIN_ID, SEPOLIA_CHAIN_ID};
use crate::error::{BridgeError, ErrorCode};

/// `source` tag on requests posted to the page
pub const REQUEST_SOURCE: &str = "lemo-extension";
/// `source` tag on responses posted back by the page agent
pub const RESPONSE_SOURCE: &str = "lemo-extension-response";

pub type TabId = i64;

/// Correlates one request with its response across both hops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Seeded once from the millisecond clock, then strictly increasing for
    /// the life of the process.
    pub fn next() -> Self {
        static NEXT_ID: LazyLock<AtomicU64> = LazyLock::new(|| {
            let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
            AtomicU64::new(millis * 1000)
        });
        RequestId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Product details scraped by the overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Displayed price, e.g. "₹29,990". Numbers are accepted too.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub usd_price: Option<String>,
    /// Currency of `price` when the page reports it separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProductData {
    /// Stable identifier for receipts: product id, then URL.
    pub fn receipt_id(&self) -> String {
        self.product_id
            .clone()
            .or_else(|| self.url.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("expected price string or number, got {}", other))),
    }
}

fn chain_id_value<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid chain id {}", n))),
        Some(Value::String(s)) => {
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse(),
            };
            parsed
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid chain id {}", s)))
        }
        Some(other) => Err(de::Error::custom(format!("invalid chain id {}", other))),
    }
}

fn payment_id(value: String, action: &str) -> Result<U256, BridgeError> {
    value
        .trim()
        .parse::<U256>()
        .map_err(|_| BridgeError::InvalidRequest(format!("{} got invalid paymentId {}", action, value)))
}

/// One wallet operation with everything it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletAction {
    CheckWallet,
    ConnectWallet,
    GetTokenBalances,
    GetSpecificTokenBalance {
        token_symbol: String,
        account: String,
    },
    SwitchNetwork {
        target_chain_id: u64,
    },
    ProcessPayment {
        product_data: ProductData,
        payment_method: String,
        wallet_address: String,
    },
    /// Reads a recorded payment back from the PaymentProcessor.
    GetPaymentDetails {
        payment_id: U256,
    },
    GetPaymentsByBuyer {
        account: String,
    },
}

impl WalletAction {
    pub fn name(&self) -> &'static str {
        match self {
            WalletAction::CheckWallet => "CHECK_WALLET",
            WalletAction::ConnectWallet => "CONNECT_WALLET",
            WalletAction::GetTokenBalances => "GET_TOKEN_BALANCES",
            WalletAction::GetSpecificTokenBalance { .. } => "GET_SPECIFIC_TOKEN_BALANCE",
            WalletAction::SwitchNetwork { .. } => "SWITCH_NETWORK",
            WalletAction::ProcessPayment { .. } => "PROCESS_PAYMENT",
            WalletAction::GetPaymentDetails { .. } => "GET_PAYMENT_DETAILS",
            WalletAction::GetPaymentsByBuyer { .. } => "GET_PAYMENTS_BY_BUYER",
        }
    }

    pub fn is_payment(&self) -> bool {
        matches!(self, WalletAction::ProcessPayment { .. })
    }
}

/// Flat wire form of a `WalletAction`: the action name plus whichever
/// parameters it uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAction {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_data: Option<ProductData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(
        default,
        deserialize_with = "chain_id_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub chain_id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_id: Option<String>,
}

impl WireAction {
    pub fn named(action: &str) -> Self {
        Self {
            action: action.to_string(),
            ..Default::default()
        }
    }
}

fn required(value: Option<String>, field: &str, action: &str) -> Result<String, BridgeError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BridgeError::InvalidRequest(format!("{} requires {}", action, field)))
}

impl TryFrom<WireAction> for WalletAction {
    type Error = BridgeError;

    fn try_from(wire: WireAction) -> Result<Self, Self::Error> {
        let action = wire.action.as_str();
        Ok(match action {
            "CHECK_WALLET" => WalletAction::CheckWallet,
            "CONNECT_WALLET" => WalletAction::ConnectWallet,
            "GET_TOKEN_BALANCES" => WalletAction::GetTokenBalances,
            "GET_SPECIFIC_TOKEN_BALANCE" => WalletAction::GetSpecificTokenBalance {
                token_symbol: required(wire.token_symbol, "tokenSymbol", action)?,
                account: required(wire.account, "account", action)?,
            },
            "SWITCH_NETWORK" => WalletAction::SwitchNetwork {
                target_chain_id: wire.chain_id.ok_or_else(|| {
                    BridgeError::InvalidRequest(format!("{} requires chainId", action))
                })?,
            },
            "SWITCH_TO_SEPOLIA" => WalletAction::SwitchNetwork {
                target_chain_id: SEPOLIA_CHAIN_ID,
            },
            "SWITCH_TO_FILECOIN" => WalletAction::SwitchNetwork {
                target_chain_id: FILECOIN_CALIBRATION_CHAIN_ID,
            },
            "PROCESS_PAYMENT" => WalletAction::ProcessPayment {
                product_data: wire.product_data.ok_or_else(|| {
                    BridgeError::InvalidRequest(format!("{} requires productData", action))
                })?,
                payment_method: required(wire.payment_method, "paymentMethod", action)?,
                wallet_address: required(wire.wallet_address, "walletAddress", action)?,
            },
            "GET_PAYMENT_DETAILS" => WalletAction::GetPaymentDetails {
                payment_id: payment_id(required(wire.payment_id, "paymentId", action)?, action)?,
            },
            "GET_PAYMENTS_BY_BUYER" => WalletAction::GetPaymentsByBuyer {
                account: required(wire.account, "account", action)?,
            },
            other => {
                return Err(BridgeError::InvalidRequest(format!("Unknown action: {}", other)));
            }
        })
    }
}

impl From<WalletAction> for WireAction {
    fn from(action: WalletAction) -> Self {
        let mut wire = WireAction::named(action.name());
        match action {
            WalletAction::CheckWallet
            | WalletAction::ConnectWallet
            | WalletAction::GetTokenBalances => {}
            WalletAction::GetSpecificTokenBalance {
                token_symbol,
                account,
            } => {
                wire.token_symbol = Some(token_symbol);
                wire.account = Some(account);
            }
            WalletAction::SwitchNetwork { target_chain_id } => {
                wire.chain_id = Some(target_chain_id);
            }
            WalletAction::ProcessPayment {
                product_data,
                payment_method,
                wallet_address,
            } => {
                wire.product_data = Some(product_data);
                wire.payment_method = Some(payment_method);
                wire.wallet_address = Some(wallet_address);
            }
            WalletAction::GetPaymentDetails { payment_id } => {
                wire.payment_id = Some(payment_id.to_string());
            }
            WalletAction::GetPaymentsByBuyer { account } => {
                wire.account = Some(account);
            }
        }
        wire
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    source: String,
    request_id: RequestId,
    #[serde(flatten)]
    action: WireAction,
}

/// Request posted on the page window for the bridge agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRequest", into = "WireRequest")]
pub struct BridgeRequest {
    pub request_id: RequestId,
    pub action: WalletAction,
}

impl BridgeRequest {
    pub fn new(action: WalletAction) -> Self {
        Self {
            request_id: RequestId::next(),
            action,
        }
    }

    /// Parses a window message into a request.
    pub fn from_message(message: &Value) -> Result<Self, BridgeError> {
        let wire: WireRequest = serde_json::from_value(message.clone())
            .map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;
        wire.try_into()
    }
}

impl TryFrom<WireRequest> for BridgeRequest {
    type Error = BridgeError;

    fn try_from(wire: WireRequest) -> Result<Self, Self::Error> {
        if wire.source != REQUEST_SOURCE {
            return Err(BridgeError::InvalidRequest(format!(
                "unexpected source {}",
                wire.source
            )));
        }
        Ok(Self {
            request_id: wire.request_id,
            action: wire.action.try_into()?,
        })
    }
}

impl From<BridgeRequest> for WireRequest {
    fn from(request: BridgeRequest) -> Self {
        Self {
            source: REQUEST_SOURCE.to_string(),
            request_id: request.request_id,
            action: request.action.into(),
        }
    }
}

fn response_source() -> String {
    RESPONSE_SOURCE.to_string()
}

/// Response posted back by the bridge agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    #[serde(default = "response_source")]
    pub source: String,
    pub request_id: RequestId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl BridgeResponse {
    pub fn ok<T: Serialize>(request_id: RequestId, result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                source: response_source(),
                request_id,
                success: true,
                result: Some(value),
                error: None,
                code: None,
            },
            Err(e) => Self::err(
                request_id,
                &BridgeError::InvalidRequest(format!("unserializable result: {}", e)),
            ),
        }
    }

    pub fn err(request_id: RequestId, error: &BridgeError) -> Self {
        Self {
            source: response_source(),
            request_id,
            success: false,
            result: None,
            error: Some(error.to_string()),
            code: Some(error.code()),
        }
    }

    /// A failure that still carries a partial result.
    pub fn failed_with<T: Serialize>(request_id: RequestId, error: &BridgeError, result: &T) -> Self {
        let mut response = Self::err(request_id, error);
        response.result = serde_json::to_value(result).ok();
        response
    }

    /// The typed error of a failed response.
    pub fn error(&self) -> Option<BridgeError> {
        if self.success {
            return None;
        }
        Some(BridgeError::from_wire(
            self.code,
            self.error.clone().unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, BridgeError> {
        if let Some(error) = self.error() {
            return Err(error);
        }
        serde_json::from_value(self.result.unwrap_or(Value::Null))
            .map_err(|e| BridgeError::InvalidRequest(format!("unexpected result shape: {}", e)))
    }
}

/// Hop-one message from the privileged context to the content script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOperation {
    pub request: BridgeRequest,
    pub timeout_ms: u64,
}

/// Messages the content script accepts from the privileged context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ExtensionMessage {
    #[serde(rename = "WALLET_OPERATION")]
    WalletOperation(WalletOperation),
}

/// What UI callers hand to the privileged relay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    #[serde(flatten)]
    pub action: WireAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
}

impl RelayRequest {
    pub fn new(action: WalletAction) -> Self {
        Self {
            action: action.into(),
            tab_id: None,
        }
    }

    pub fn on_tab(mut self, tab_id: TabId) -> Self {
        self.tab_id = Some(tab_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Decimal chain id, as `net_version` reports it
    pub id: String,
    /// Hex chain id, as `eth_chainId` reports it
    pub chain_id: String,
    pub name: String,
}

impl NetworkInfo {
    pub fn new(chain_id: u64) -> Self {
        Self {
            id: chain_id.to_string(),
            chain_id: format!("{:#x}", chain_id),
            name: crate::config::chain_name(chain_id).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatus {
    pub is_installed: bool,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WalletStatus {
    pub fn not_installed() -> Self {
        Self {
            is_installed: false,
            accounts: Vec::new(),
            network: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub symbol: String,
    /// Integer amount in the token's smallest unit
    pub balance: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenBalance {
    /// A zero balance that explains why it could not be read.
    pub fn unavailable(symbol: &str, decimals: u8, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            balance: "0".to_string(),
            decimals,
            contract_address: None,
            formatted: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalances {
    pub account: String,
    pub native: TokenBalance,
    pub tokens: Vec<TokenBalance>,
    pub network: NetworkInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSwitch {
    pub chain_id: u64,
    pub name: String,
    /// Whether the chain had to be added to the wallet first
    pub added: bool,
    pub message: String,
}

/// A payment as the PaymentProcessor recorded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub payment_id: String,
    pub buyer: String,
    pub product_id: String,
    /// Integer amount in the token's smallest unit
    pub amount: String,
    pub payment_token: String,
    pub currency: String,
    pub receipt_id: String,
    pub receipt_cid: String,
    /// Block timestamp, seconds
    pub timestamp: u64,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerPayments {
    pub buyer: String,
    pub payment_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = BridgeRequest {
            request_id: RequestId(42),
            action: WalletAction::GetSpecificTokenBalance {
                token_symbol: "PYUSD".to_string(),
                account: "0xabc".to_string(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "source": "lemo-extension",
                "requestId": 42,
                "action": "GET_SPECIFIC_TOKEN_BALANCE",
                "tokenSymbol": "PYUSD",
                "account": "0xabc"
            })
        );
        let back: BridgeRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_legacy_switch_actions() {
        let request: BridgeRequest = serde_json::from_value(json!({
            "source": "lemo-extension", "requestId": 1, "action": "SWITCH_TO_FILECOIN"
        }))
        .unwrap();
        assert_eq!(
            request.action,
            WalletAction::SwitchNetwork { target_chain_id: 314159 }
        );

        let request: BridgeRequest = serde_json::from_value(json!({
            "source": "lemo-extension", "requestId": 2, "action": "SWITCH_NETWORK", "chainId": "0xaa36a7"
        }))
        .unwrap();
        assert_eq!(
            request.action,
            WalletAction::SwitchNetwork { target_chain_id: 11155111 }
        );
    }

    #[test]
    fn test_malformed_requests_rejected() {
        // Wrong source
        assert!(serde_json::from_value::<BridgeRequest>(json!({
            "source": "someone-else", "requestId": 1, "action": "CHECK_WALLET"
        }))
        .is_err());
        // Missing parameter
        assert!(serde_json::from_value::<BridgeRequest>(json!({
            "source": "lemo-extension", "requestId": 1, "action": "GET_SPECIFIC_TOKEN_BALANCE",
            "tokenSymbol": "PYUSD"
        }))
        .is_err());
        // Unknown action
        assert!(serde_json::from_value::<BridgeRequest>(json!({
            "source": "lemo-extension", "requestId": 1, "action": "DRAIN_WALLET"
        }))
        .is_err());
    }

    #[test]
    fn test_product_price_accepts_numbers() {
        let product: ProductData = serde_json::from_value(json!({
            "title": "Headphones", "price": 29990, "usdPrice": "359.88"
        }))
        .unwrap();
        assert_eq!(product.price.as_deref(), Some("29990"));
        assert_eq!(product.usd_price.as_deref(), Some("359.88"));
        assert_eq!(product.receipt_id(), "unknown");
    }

    #[test]
    fn test_failed_response_round_trips_error_code() {
        let err = BridgeError::NoActiveTab;
        let response = BridgeResponse::err(RequestId(7), &err);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["source"], "lemo-extension-response");
        assert_eq!(json["code"], "NO_ACTIVE_TAB");

        let back: BridgeResponse = serde_json::from_value(json).unwrap();
        let typed = back.into_result::<Value>().unwrap_err();
        assert_eq!(typed.code(), ErrorCode::NoActiveTab);
        assert_eq!(typed.to_string(), "No active tab available");
    }

    #[test]
    fn test_wallet_operation_envelope() {
        let message = ExtensionMessage::WalletOperation(WalletOperation {
            request: BridgeRequest {
                request_id: RequestId(9),
                action: WalletAction::CheckWallet,
            },
            timeout_ms: 15000,
        });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["action"], "WALLET_OPERATION");
        assert_eq!(json["timeoutMs"], 15000);
        assert_eq!(json["request"]["action"], "CHECK_WALLET");
        assert_eq!(serde_json::from_value::<ExtensionMessage>(json).unwrap(), message);
    }

    #[test]
    fn test_relay_request_from_ui_json() {
        let request: RelayRequest = serde_json::from_value(json!({
            "action": "GET_SPECIFIC_TOKEN_BALANCE", "tokenSymbol": "USDC", "account": "0x1", "tabId": 12
        }))
        .unwrap();
        assert_eq!(request.tab_id, Some(12));
        let action = WalletAction::try_from(request.action).unwrap();
        assert!(matches!(action, WalletAction::GetSpecificTokenBalance { .. }));
    }

    #[test]
    fn test_request_ids_strictly_increase() {
        let ids: Vec<RequestId> = (0..5000).map(|_| RequestId::next()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_request_ids_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..2000).map(|_| RequestId::next()).collect::<Vec<_>>()))
            .collect();
        let mut ids: Vec<RequestId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_payment_read_actions() {
        let request: BridgeRequest = serde_json::from_value(json!({
            "source": "lemo-extension", "requestId": 3, "action": "GET_PAYMENT_DETAILS", "paymentId": 12
        }))
        .unwrap();
        assert_eq!(
            request.action,
            WalletAction::GetPaymentDetails { payment_id: U256::from(12u64) }
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["paymentId"], "12");

        let err = WalletAction::try_from(WireAction {
            action: "GET_PAYMENT_DETAILS".to_string(),
            payment_id: Some("twelve".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);

        assert!(WalletAction::try_from(WireAction::named("GET_PAYMENTS_BY_BUYER")).is_err());
    }
}
