use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::protocol::{BridgeResponse, RequestId};

/// Outstanding requests waiting for their response, keyed by request id.
///
/// One map lives for the lifetime of the content script; every forwarded
/// request registers here and is removed exactly once, by its response or
/// when its `Waiter` is dropped.
#[derive(Clone, Default)]
pub struct PendingRequests {
    waiters: Arc<Mutex<HashMap<RequestId, oneshot::Sender<BridgeResponse>>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: RequestId) -> Waiter {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.lock();
        if waiters.insert(id, tx).is_some() {
            log::warn!("[Content] Request {} registered twice; earlier waiter dropped", id);
        }
        Waiter {
            id,
            rx,
            pending: self.clone(),
        }
    }

    /// Hands the response to its waiter. Returns false when nobody is
    /// waiting (unknown id, already resolved, or timed out).
    pub fn resolve(&self, response: BridgeResponse) -> bool {
        let sender = self.lock().remove(&response.request_id);
        match sender {
            Some(sender) => sender.send(response).is_ok(),
            None => {
                log::debug!("[Content] Ignoring response for unknown request {}", response.request_id);
                false
            }
        }
    }

    pub fn cancel(&self, id: RequestId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the entry for `id` if nobody is listening on it any more.
    fn release(&self, id: RequestId) {
        let mut waiters = self.lock();
        if waiters.get(&id).is_some_and(|sender| sender.is_closed()) {
            waiters.remove(&id);
            log::debug!("[Content] Released abandoned request {}", id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, oneshot::Sender<BridgeResponse>>> {
        // A poisoned map is still a valid map
        self.waiters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resolves with the response for one request. Dropping it, whether on
/// timeout or because the caller went away, removes its map entry.
pub struct Waiter {
    id: RequestId,
    rx: oneshot::Receiver<BridgeResponse>,
    pending: PendingRequests,
}

impl Future for Waiter {
    type Output = Result<BridgeResponse, oneshot::error::RecvError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx)
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.rx.close();
        self.pending.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: u64) -> BridgeResponse {
        BridgeResponse::ok(RequestId(id), &json!({ "ok": true }))
    }

    #[tokio::test]
    async fn test_resolve_matches_by_id() {
        let pending = PendingRequests::new();
        let rx_a = pending.register(RequestId(1));
        let rx_b = pending.register(RequestId(2));
        assert_eq!(pending.len(), 2);

        assert!(pending.resolve(response(2)));
        assert_eq!(rx_b.await.unwrap().request_id, RequestId(2));

        assert!(pending.resolve(response(1)));
        assert_eq!(rx_a.await.unwrap().request_id, RequestId(1));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_unknown_id_resolves_nobody() {
        let pending = PendingRequests::new();
        let _rx = pending.register(RequestId(1));
        assert!(!pending.resolve(response(99)));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_dropped_waiter_releases_entry() {
        let pending = PendingRequests::new();
        let waiter = pending.register(RequestId(6));
        assert_eq!(pending.len(), 1);
        drop(waiter);
        assert!(pending.is_empty());
        assert!(!pending.resolve(response(6)));
    }

    #[test]
    fn test_stale_waiter_keeps_newer_registration() {
        let pending = PendingRequests::new();
        let first = pending.register(RequestId(8));
        let _second = pending.register(RequestId(8));
        drop(first);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_cancelled_entry_ignores_late_response() {
        let pending = PendingRequests::new();
        let _rx = pending.register(RequestId(5));
        assert!(pending.cancel(RequestId(5)));
        assert!(!pending.resolve(response(5)));
    }
}
