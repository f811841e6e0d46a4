//! In-process stand-ins for the page window and extension tab messaging.
//! Both bridge hops run unchanged on top of them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::agent::BridgeAgent;
use super::content::{ContentRelay, PageContext};
use super::protocol::TabId;
use super::relay::{DeliveryError, TabMessenger};

const WINDOW_CAPACITY: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A page: one window message bus and, once injected, the bridge agent
/// listening on it.
pub struct LocalPage {
    window: broadcast::Sender<Value>,
    agent: Arc<BridgeAgent>,
    agent_task: Mutex<Option<JoinHandle<()>>>,
    block_scripts: bool,
}

impl LocalPage {
    pub fn new(agent: BridgeAgent) -> Arc<Self> {
        let (window, _) = broadcast::channel(WINDOW_CAPACITY);
        Arc::new(Self {
            window,
            agent: Arc::new(agent),
            agent_task: Mutex::new(None),
            block_scripts: false,
        })
    }

    /// A page whose CSP refuses extension scripts.
    pub fn with_blocked_scripts(agent: BridgeAgent) -> Arc<Self> {
        let (window, _) = broadcast::channel(WINDOW_CAPACITY);
        Arc::new(Self {
            window,
            agent: Arc::new(agent),
            agent_task: Mutex::new(None),
            block_scripts: true,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.window.subscribe()
    }
}

#[async_trait]
impl PageContext for LocalPage {
    fn post_message(&self, message: Value) {
        // No listeners is fine, same as a real window
        let _ = self.window.send(message);
    }

    fn agent_present(&self) -> bool {
        lock(&self.agent_task).is_some()
    }

    async fn inject_agent(&self) -> Result<(), String> {
        if self.block_scripts {
            return Err("Refused to load the script because it violates the page's Content Security Policy".to_string());
        }
        let mut task = lock(&self.agent_task);
        if task.is_none() {
            let handle = Arc::clone(&self.agent).listen(self.window.subscribe(), self.window.clone());
            *task = Some(handle);
            log::info!("[Local] Bridge agent listening on page window");
        }
        Ok(())
    }
}

impl Drop for LocalPage {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.agent_task).take() {
            handle.abort();
        }
    }
}

struct LocalTab {
    page: Arc<LocalPage>,
    content: Option<Arc<ContentRelay>>,
    listener: Option<JoinHandle<()>>,
}

/// Tab registry with content-script injection on demand.
pub struct LocalTabs {
    tabs: Mutex<HashMap<TabId, LocalTab>>,
    active: Mutex<Option<TabId>>,
    agent_load_timeout: Duration,
    injections: AtomicUsize,
    block_content_scripts: bool,
}

impl LocalTabs {
    pub fn new(agent_load_timeout: Duration) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            agent_load_timeout,
            injections: AtomicUsize::new(0),
            block_content_scripts: false,
        }
    }

    /// Tabs the extension may not script (e.g. browser pages).
    pub fn restricted(agent_load_timeout: Duration) -> Self {
        let mut tabs = Self::new(agent_load_timeout);
        tabs.block_content_scripts = true;
        tabs
    }

    /// Opens a page in a new tab and makes it active.
    pub fn open(&self, tab: TabId, page: Arc<LocalPage>) {
        lock(&self.tabs).insert(
            tab,
            LocalTab {
                page,
                content: None,
                listener: None,
            },
        );
        self.activate(tab);
    }

    pub fn activate(&self, tab: TabId) {
        *lock(&self.active) = Some(tab);
    }

    pub fn close(&self, tab: TabId) {
        if let Some(removed) = lock(&self.tabs).remove(&tab) {
            if let Some(listener) = removed.listener {
                listener.abort();
            }
        }
        let mut active = lock(&self.active);
        if *active == Some(tab) {
            *active = None;
        }
    }

    pub fn injection_count(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    /// Outstanding requests in the tab's content script.
    pub fn pending_in(&self, tab: TabId) -> usize {
        lock(&self.tabs)
            .get(&tab)
            .and_then(|t| t.content.as_ref())
            .map(|c| c.pending_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl TabMessenger for LocalTabs {
    async fn active_tab(&self) -> Option<TabId> {
        *lock(&self.active)
    }

    async fn send_to_tab(&self, tab: TabId, message: Value) -> Result<Value, DeliveryError> {
        let content = {
            let tabs = lock(&self.tabs);
            let entry = tabs.get(&tab).ok_or(DeliveryError::TabNotFound(tab))?;
            entry.content.clone().ok_or(DeliveryError::NoReceiver)?
        };

        let response = content
            .on_extension_message(message)
            .await
            .ok_or_else(|| DeliveryError::Other("The message port closed before a response was received.".to_string()))?;
        serde_json::to_value(&response).map_err(|e| DeliveryError::Other(e.to_string()))
    }

    async fn inject_content_script(&self, tab: TabId) -> Result<(), DeliveryError> {
        if self.block_content_scripts {
            return Err(DeliveryError::Other(
                "Cannot access contents of the page. Extension manifest must request permission to access the respective host.".to_string(),
            ));
        }

        let mut tabs = lock(&self.tabs);
        let entry = tabs.get_mut(&tab).ok_or(DeliveryError::TabNotFound(tab))?;
        if entry.content.is_some() {
            return Ok(());
        }

        let page: Arc<dyn PageContext> = entry.page.clone();
        let content = Arc::new(ContentRelay::new(page, self.agent_load_timeout));
        entry.listener = Some(Arc::clone(&content).listen(entry.page.subscribe()));
        entry.content = Some(content);
        self.injections.fetch_add(1, Ordering::SeqCst);
        log::info!("[Local] Content script injected into tab {}", tab);
        Ok(())
    }
}

impl Drop for LocalTabs {
    fn drop(&mut self) {
        for (_, tab) in lock(&self.tabs).drain() {
            if let Some(listener) = tab.listener {
                listener.abort();
            }
        }
    }
}
