//! Publish/subscribe for in-process change notification.
//!
//! Listeners are invoked synchronously on the publishing thread. A listener
//! that panics is logged and skipped; the publisher and the remaining
//! listeners are unaffected. Delivery order is unspecified.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Listeners<E> = Mutex<HashMap<u64, Listener<E>>>;

/// A set of listeners for events of type `E`
pub struct SubscriberSet<E> {
    listeners: Arc<Listeners<E>>,
    next_id: AtomicU64,
}

impl<E: 'static> Default for SubscriberSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> SubscriberSet<E> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a listener; it stays registered until the handle is
    /// passed to [`Subscription::unsubscribe`]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));

        let weak: Weak<Listeners<E>> = Arc::downgrade(&self.listeners);
        Subscription {
            id,
            remove: Box::new(move |id| {
                if let Some(listeners) = weak.upgrade() {
                    listeners
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&id);
                }
            }),
        }
    }

    /// Deliver an event to every listener
    pub fn publish(&self, event: &E) {
        // Snapshot so listeners may (un)subscribe while being notified
        let snapshot: Vec<(u64, Listener<E>)> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(subscriber = id, "Subscriber panicked during notification");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Handle returned by `subscribe`
pub struct Subscription {
    id: u64,
    remove: Box<dyn FnOnce(u64) + Send + Sync>,
}

impl Subscription {
    /// Stop receiving events
    pub fn unsubscribe(self) {
        (self.remove)(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let set: SubscriberSet<u32> = SubscriberSet::new();
        let total = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let total = Arc::clone(&total);
            let _sub = set.subscribe(move |n| {
                total.fetch_add(*n as usize, Ordering::SeqCst);
            });
        }

        set.publish(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let set: SubscriberSet<()> = SubscriberSet::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let sub = set.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        set.publish(&());
        sub.unsubscribe();
        set.publish(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let set: SubscriberSet<()> = SubscriberSet::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let _bad = set.subscribe(|_| panic!("listener failure"));
        let counter = Arc::clone(&calls);
        let _good = set.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        set.publish(&());
        set.publish(&());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
