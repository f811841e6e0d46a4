use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::pending::PendingRequests;
use super::protocol::{BridgeResponse, ExtensionMessage, WalletOperation, RESPONSE_SOURCE};
use crate::error::BridgeError;

/// The page window as seen from the content script.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Posts to the window. Every window listener sees the message.
    fn post_message(&self, message: Value);

    fn agent_present(&self) -> bool;

    /// Loads the bridge agent into the page.
    async fn inject_agent(&self) -> Result<(), String>;
}

/// Content-script side of the bridge: forwards operations from the
/// extension onto the window and waits for the agent's answer.
pub struct ContentRelay {
    page: Arc<dyn PageContext>,
    pending: PendingRequests,
    agent_load_timeout: Duration,
}

impl ContentRelay {
    pub fn new(page: Arc<dyn PageContext>, agent_load_timeout: Duration) -> Self {
        Self {
            page,
            pending: PendingRequests::new(),
            agent_load_timeout,
        }
    }

    pub async fn forward(&self, operation: WalletOperation) -> BridgeResponse {
        let request = operation.request;
        let id = request.request_id;
        let action = request.action.name();

        if !self.page.agent_present() {
            log::info!("[Content] Injecting wallet bridge agent");
            match tokio::time::timeout(self.agent_load_timeout, self.page.inject_agent()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("[Content] Agent injection failed: {}", e);
                    return BridgeResponse::err(id, &BridgeError::InjectionFailed(e));
                }
                Err(_) => log::warn!(
                    "[Content] Agent did not report loaded within {:?}, posting anyway",
                    self.agent_load_timeout
                ),
            }
        }

        let message = match serde_json::to_value(&request) {
            Ok(message) => message,
            Err(e) => {
                return BridgeResponse::err(id, &BridgeError::InvalidRequest(e.to_string()));
            }
        };

        let waiter = self.pending.register(id);
        self.page.post_message(message);
        log::debug!("[Content] Posted {} ({}), waiting {}ms", action, id, operation.timeout_ms);

        match tokio::time::timeout(Duration::from_millis(operation.timeout_ms), waiter).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                // Waiter replaced by a second registration of the same id
                BridgeResponse::err(
                    id,
                    &BridgeError::InvalidRequest(format!("request {} was superseded", id)),
                )
            }
            Err(_) => {
                log::warn!("[Content] {} ({}) timed out", action, id);
                BridgeResponse::err(
                    id,
                    &BridgeError::BridgeTimeout {
                        action: action.to_string(),
                        after_ms: operation.timeout_ms,
                    },
                )
            }
        }
    }

    /// Window listener. Returns true when the message resolved a waiter.
    pub fn on_window_message(&self, message: &Value) -> bool {
        if message.get("source").and_then(Value::as_str) != Some(RESPONSE_SOURCE) {
            return false;
        }
        match serde_json::from_value::<BridgeResponse>(message.clone()) {
            Ok(response) => self.pending.resolve(response),
            Err(e) => {
                log::warn!("[Content] Dropping malformed response: {}", e);
                false
            }
        }
    }

    /// Extension message listener. `None` for messages meant for someone
    /// else.
    pub async fn on_extension_message(&self, message: Value) -> Option<BridgeResponse> {
        match serde_json::from_value::<ExtensionMessage>(message) {
            Ok(ExtensionMessage::WalletOperation(operation)) => Some(self.forward(operation).await),
            Err(_) => None,
        }
    }

    pub fn listen(self: Arc<Self>, mut window: broadcast::Receiver<Value>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match window.recv().await {
                    Ok(message) => {
                        self.on_window_message(&message);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("[Content] Window listener lagged, {} messages dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
