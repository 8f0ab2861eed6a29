//! Change-notification events with weakly-held subscribers.
//!
//! Subscriber callbacks are stored as `Weak` references in a slab of
//! arena-owned slots, so a subscriber that is dropped without explicitly
//! cancelling never fires again and never keeps the publisher's registry
//! growing. `subscribe` returns a [`Subscription`] handle; dropping the handle
//! removes the slot eagerly. Both halves must be held for delivery: the
//! handle keeps the slot, the `Arc` keeps the callback.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slab::Slab;

/// Callback invoked with the name of the property that changed.
pub type ChangeHandler = dyn Fn(&str) + Send + Sync;

type Registry = Mutex<Slab<Weak<ChangeHandler>>>;

/// A property-changed event published by an observable object.
///
/// Cloning shares the subscriber registry, so a clone raises to the same
/// subscribers as the original.
#[derive(Clone, Default)]
pub struct PropertyChangedEvent {
    subscribers: Arc<Registry>,
}

impl PropertyChangedEvent {
    /// Create an event with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for change notifications.
    ///
    /// The registry holds the callback weakly: the caller must keep the
    /// `Arc` alive for as long as notifications should be delivered. The
    /// returned handle removes the slot when dropped.
    pub fn subscribe(&self, handler: &Arc<ChangeHandler>) -> Subscription {
        let mut subscribers = self.subscribers.lock();
        let key = subscribers.insert(Arc::downgrade(handler));
        Subscription {
            key,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Notify subscribers that `property` changed.
    ///
    /// Live callbacks are snapshotted under the lock and invoked outside it,
    /// so a callback may re-enter the event (subscribe, raise) freely. Dead
    /// slots are pruned on the way through.
    pub fn raise(&self, property: &str) {
        let handlers: Vec<Arc<ChangeHandler>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|_, weak| weak.strong_count() > 0);
            subscribers
                .iter()
                .filter_map(|(_, weak)| weak.upgrade())
                .collect()
        };
        for handler in handlers {
            handler(property);
        }
    }

    /// Number of live subscriber slots.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|_, weak| weak.strong_count() > 0);
        subscribers.len()
    }
}

/// Handle to one subscriber slot.
///
/// Dropping the handle unsubscribes. If the publisher is gone the drop is a
/// no-op.
pub struct Subscription {
    key: usize,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the slot now instead of at drop time.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut subscribers = registry.lock();
            if subscribers.contains(self.key) {
                subscribers.remove(self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn raises_to_live_subscribers() {
        let event = PropertyChangedEvent::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let handler: Arc<ChangeHandler> = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let _subscription = event.subscribe(&handler);

        event.raise("Name");
        event.raise("Name");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_the_subscription_unsubscribes() {
        let event = PropertyChangedEvent::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let handler: Arc<ChangeHandler> = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let subscription = event.subscribe(&handler);
        assert_eq!(event.subscriber_count(), 1);

        subscription.cancel();
        assert_eq!(event.subscriber_count(), 0);

        event.raise("Name");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_the_handler_silences_the_slot() {
        let event = PropertyChangedEvent::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let handler: Arc<ChangeHandler> = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let _subscription = event.subscribe(&handler);
        drop(handler);

        event.raise("Name");
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(event.subscriber_count(), 0);
    }

    #[test]
    fn handlers_receive_the_property_name() {
        let event = PropertyChangedEvent::new();
        let names = Arc::new(Mutex::new(Vec::new()));

        let seen = names.clone();
        let handler: Arc<ChangeHandler> = Arc::new(move |name| {
            seen.lock().push(name.to_string());
        });
        let _subscription = event.subscribe(&handler);

        event.raise("First");
        event.raise("Second");
        assert_eq!(*names.lock(), vec!["First", "Second"]);
    }
}
