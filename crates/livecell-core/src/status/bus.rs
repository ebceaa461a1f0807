//! Subscriber registry for status messages.
//!
//! Every component reports transitions through a [`StatusBus`] without knowing
//! who listens. Subscriptions are explicit guards: dropping the guard removes
//! the callback, so a UI scope that goes away takes its listeners with it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;

use super::types::StatusMessage;

/// Callback invoked for every published status message.
pub type StatusCallback = Arc<dyn Fn(&StatusMessage) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, StatusCallback)>>,
}

impl BusInner {
    fn subscribers(&self) -> MutexGuard<'_, Vec<(u64, StatusCallback)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registry of status subscribers.
///
/// Cloning is cheap and every clone publishes to the same subscribers.
#[derive(Clone, Default)]
pub struct StatusBus {
    inner: Arc<BusInner>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    ///
    /// The callback stays registered until the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription deregisters the callback"]
    pub fn subscribe(&self, callback: impl Fn(&StatusMessage) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers().push((id, Arc::new(callback)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Register a channel-backed subscriber for async consumers.
    ///
    /// The channel is unbounded so a slow consumer never loses messages.
    #[must_use = "dropping the subscription deregisters the channel"]
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<StatusMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |msg| {
            let _ = tx.send(msg.clone());
        });
        (subscription, rx)
    }

    /// Deliver a message to every current subscriber, in registration order.
    pub fn publish(&self, msg: StatusMessage) {
        tracing::debug!(subject = %msg.subject(), id = ?msg.id, status = %msg.status, "{}", msg.message);

        // Snapshot so callbacks may subscribe or unsubscribe while being called
        let callbacks: Vec<StatusCallback> = self
            .inner
            .subscribers()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in callbacks {
            callback(&msg);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

impl std::fmt::Debug for StatusBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Guard that keeps a callback registered on a [`StatusBus`].
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Explicitly deregister. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers().retain(|(id, _)| *id != self.id);
        }
    }
}
