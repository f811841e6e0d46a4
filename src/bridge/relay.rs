use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::protocol::{
    BridgeRequest, BridgeResponse, ExtensionMessage, RelayRequest, RequestId, TabId, WalletAction,
    WalletOperation,
};
use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Why a message did not reach a tab.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    #[error("Could not establish connection. Receiving end does not exist.")]
    NoReceiver,
    #[error("No tab with id: {0}")]
    TabNotFound(TabId),
    #[error("{0}")]
    Other(String),
}

/// Extension tab messaging, as used by the privileged context.
#[async_trait]
pub trait TabMessenger: Send + Sync {
    async fn active_tab(&self) -> Option<TabId>;

    /// Sends to the tab's content script and waits for its reply.
    async fn send_to_tab(&self, tab: TabId, message: Value) -> Result<Value, DeliveryError>;

    async fn inject_content_script(&self, tab: TabId) -> Result<(), DeliveryError>;
}

/// Privileged side of the bridge. UI callers hand it a request and get a
/// response back; tab resolution, injection and timeouts happen here.
pub struct WalletRelay {
    tabs: Arc<dyn TabMessenger>,
    config: Arc<BridgeConfig>,
}

impl WalletRelay {
    pub fn new(tabs: Arc<dyn TabMessenger>, config: Arc<BridgeConfig>) -> Self {
        Self { tabs, config }
    }

    /// Entry point for UI messages.
    pub async fn dispatch(&self, request: RelayRequest) -> BridgeResponse {
        match WalletAction::try_from(request.action) {
            Ok(action) => self.dispatch_action(action, request.tab_id).await,
            Err(e) => {
                log::warn!("[Relay] Rejecting request: {}", e);
                BridgeResponse::err(RequestId::next(), &e)
            }
        }
    }

    pub async fn dispatch_action(&self, action: WalletAction, tab: Option<TabId>) -> BridgeResponse {
        let request = BridgeRequest::new(action);
        let id = request.request_id;
        let name = request.action.name();

        let tab = match tab {
            Some(tab) => tab,
            None => match self.tabs.active_tab().await {
                Some(tab) => tab,
                None => return BridgeResponse::err(id, &BridgeError::NoActiveTab),
            },
        };

        let window = if request.action.is_payment() {
            self.config.payment_timeout
        } else {
            self.config.request_timeout
        };
        let guard = window + self.config.agent_load_timeout + self.config.injection_retry_delay;

        let message = ExtensionMessage::WalletOperation(WalletOperation {
            request,
            timeout_ms: window.as_millis() as u64,
        });
        let message = match serde_json::to_value(&message) {
            Ok(message) => message,
            Err(e) => return BridgeResponse::err(id, &BridgeError::InvalidRequest(e.to_string())),
        };

        log::info!("[Relay] {} ({}) to tab {}", name, id, tab);
        let reply = match tokio::time::timeout(guard, self.deliver(tab, message)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                log::error!("[Relay] {} ({}) not delivered: {}", name, id, e);
                return BridgeResponse::err(id, &e);
            }
            Err(_) => {
                log::warn!("[Relay] {} ({}) got no answer from tab {}", name, id, tab);
                return BridgeResponse::err(
                    id,
                    &BridgeError::BridgeTimeout {
                        action: name.to_string(),
                        after_ms: guard.as_millis() as u64,
                    },
                );
            }
        };

        match serde_json::from_value::<BridgeResponse>(reply) {
            Ok(response) if response.request_id == id => response,
            Ok(response) => BridgeResponse::err(
                id,
                &BridgeError::InvalidRequest(format!(
                    "response for request {} arrived on request {}",
                    response.request_id, id
                )),
            ),
            Err(e) => BridgeResponse::err(
                id,
                &BridgeError::InvalidRequest(format!("malformed response from tab: {}", e)),
            ),
        }
    }

    /// Typed form of `dispatch_action`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        action: WalletAction,
        tab: Option<TabId>,
    ) -> Result<T, BridgeError> {
        self.dispatch_action(action, tab).await.into_result()
    }

    /// Sends once; on failure injects the content script and retries once.
    async fn deliver(&self, tab: TabId, message: Value) -> Result<Value, BridgeError> {
        let first = match self.tabs.send_to_tab(tab, message.clone()).await {
            Ok(reply) => return Ok(reply),
            Err(e) => e,
        };

        log::info!("[Relay] Tab {} did not answer ({}), injecting content script", tab, first);
        self.tabs
            .inject_content_script(tab)
            .await
            .map_err(|e| BridgeError::InjectionFailed(e.to_string()))?;

        tokio::time::sleep(self.config.injection_retry_delay).await;

        self.tabs
            .send_to_tab(tab, message)
            .await
            .map_err(|e| BridgeError::InjectionFailed(format!("retry after injection failed: {}", e)))
    }
}
