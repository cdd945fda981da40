use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

/// Topic published when user-status data changed behind a view that has no
/// direct return channel.
pub const REFRESH_USER_STATUS: &str = "refreshUserStatus";

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle for one subscription; pass back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct BusInner {
    next_id: u64,
    topics: HashMap<String, Vec<(SubscriptionId, Handler)>>,
}

/// Process-wide publish/subscribe channel, used when a sub-view cannot
/// return a value synchronously. Delivery is synchronous on the
/// publisher's stack, in subscription order; a publish with zero
/// subscribers is silently dropped.
pub struct RefreshSignalBus {
    inner: Mutex<BusInner>,
}

impl Default for RefreshSignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshSignalBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusInner {
                next_id: 0,
                topics: HashMap::new(),
            }),
        }
    }

    pub fn subscribe(
        &self,
        topic: &str,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns false when the id was already gone,
    /// which lets teardown paths stay idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let mut removed = false;
        for handlers in inner.topics.values_mut() {
            let before = handlers.len();
            handlers.retain(|(sub_id, _)| *sub_id != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.topics.get(topic).map_or(0, Vec::len)
    }

    /// Deliver `payload` to every current subscriber of `topic`. A
    /// panicking handler is caught and logged so delivery continues to the
    /// remaining subscribers.
    pub fn publish(&self, topic: &str, payload: Value) {
        // Handlers run outside the lock so they may re-enter the bus.
        let handlers: Vec<Handler> = {
            let inner = self.inner.lock().unwrap();
            match inner.topics.get(topic) {
                Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return,
            }
        };
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&payload))).is_err() {
                warn!(topic, "refresh signal handler panicked; continuing delivery");
            }
        }
    }
}
