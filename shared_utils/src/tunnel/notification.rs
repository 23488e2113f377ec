//! Lifecycle events and the in-process bus that fans them out.
//!
//! Delivery is synchronous: `publish` invokes every registered subscriber,
//! in subscription order, on the caller's own thread or task. Subscribers
//! are not persisted anywhere and vanish with the process.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock, Weak};

use tokio::sync::mpsc;
use tracing::trace;

use crate::tunnel::error::TunnelError;
use crate::tunnel::types::{BundleId, TunnelStatus};

/// Immutable record of a lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The tunnel profile was (re)installed or its enabled flag changed
    Reinstalled {
        bundle_id: Option<BundleId>,
        enabled: bool,
    },

    /// The tunnel moved to a new status
    StatusChanged {
        bundle_id: Option<BundleId>,
        enabled: bool,
        status: TunnelStatus,
    },

    /// A lifecycle operation failed
    Failed { error: TunnelError },
}

impl LifecycleEvent {
    /// Status carried by a `StatusChanged` event.
    pub fn status(&self) -> Option<TunnelStatus> {
        match self {
            LifecycleEvent::StatusChanged { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Identifier handed out on subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    active: AtomicBool,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                let subscriber = subscribers.remove(index);
                subscriber.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }
}

/// Publish/subscribe channel for [`LifecycleEvent`]s.
///
/// Cloning is cheap; clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl NotificationBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        NotificationBus::default()
    }

    /// Process-wide bus for consumers that do not get one injected.
    pub fn global() -> &'static NotificationBus {
        static GLOBAL: OnceLock<NotificationBus> = OnceLock::new();
        GLOBAL.get_or_init(NotificationBus::new)
    }

    /// Register a callback. It stays registered while the returned
    /// [`Subscription`] is alive, or forever after [`Subscription::detach`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Arc::new(Subscriber {
            id,
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        });
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(subscriber);
        trace!(subscription = id.0, "Subscriber registered");

        Subscription {
            id,
            bus: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// Register a subscriber that forwards every event into a channel.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            // receiver gone means the consumer stopped listening
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// Deliver `event` to every current subscriber, in subscription order.
    pub fn publish(&self, event: &LifecycleEvent) {
        let snapshot: Vec<Arc<Subscriber>> = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        trace!(subscribers = snapshot.len(), event = ?event, "Publishing lifecycle event");
        for subscriber in snapshot {
            if subscriber.active.load(Ordering::Acquire) {
                (subscriber.callback)(event);
            }
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle to a registered subscriber; unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    bus: Option<Weak<BusInner>>,
}

impl Subscription {
    /// Identifier of this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscriber now.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Keep the subscriber registered for the lifetime of the bus.
    pub fn detach(mut self) -> SubscriptionId {
        self.bus = None;
        self.id
    }

    fn release(&mut self) -> bool {
        match self.bus.take().and_then(|bus| bus.upgrade()) {
            Some(inner) => inner.remove(self.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
