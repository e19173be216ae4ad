//! Connection lifecycle notifications, independent of message listeners.

use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked on a lifecycle edge.
pub(crate) type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Publish/subscribe for the two lifecycle edges, `connected` and
/// `disconnected`.
///
/// Subscribers persist for the life of the owning connection handle — they
/// are not cleared on teardown, so the same subscriber observes every
/// reconnect. Notification is synchronous, in registration order.
pub(crate) struct LifecycleEvents {
    connected: Mutex<Vec<LifecycleCallback>>,
    disconnected: Mutex<Vec<LifecycleCallback>>,
}

impl LifecycleEvents {
    pub fn new() -> Self {
        Self {
            connected: Mutex::new(Vec::new()),
            disconnected: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to the `connected` edge.
    pub fn on_connected(&self, callback: LifecycleCallback) {
        self.connected.lock().push(callback);
    }

    /// Subscribe to the `disconnected` edge.
    pub fn on_disconnected(&self, callback: LifecycleCallback) {
        self.disconnected.lock().push(callback);
    }

    /// Invoke `connected` subscribers.
    pub fn notify_connected(&self) {
        // Snapshot first: a subscriber may itself subscribe.
        let subscribers = self.connected.lock().clone();
        for callback in &subscribers {
            callback();
        }
    }

    /// Invoke `disconnected` subscribers.
    pub fn notify_disconnected(&self) {
        let subscribers = self.disconnected.lock().clone();
        for callback in &subscribers {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (LifecycleCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let callback: LifecycleCallback = Arc::new(move || {
            let _ = count2.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    #[test]
    fn connected_subscribers_fire() {
        let events = LifecycleEvents::new();
        let (callback, count) = counter();
        events.on_connected(callback);

        events.notify_connected();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn edges_are_independent() {
        let events = LifecycleEvents::new();
        let (connected, connected_count) = counter();
        let (disconnected, disconnected_count) = counter();
        events.on_connected(connected);
        events.on_disconnected(disconnected);

        events.notify_disconnected();
        assert_eq!(connected_count.load(Ordering::SeqCst), 0);
        assert_eq!(disconnected_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribers_fire_in_registration_order() {
        let events = LifecycleEvents::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order2 = Arc::clone(&order);
            events.on_connected(Arc::new(move || order2.lock().push(tag)));
        }

        events.notify_connected();
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn subscribers_persist_across_notifications() {
        let events = LifecycleEvents::new();
        let (callback, count) = counter();
        events.on_connected(callback);

        events.notify_connected();
        events.notify_connected();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscriber_may_subscribe_during_notification() {
        let events = Arc::new(LifecycleEvents::new());
        let (late, late_count) = counter();

        let events2 = Arc::clone(&events);
        let armed = Arc::new(AtomicUsize::new(0));
        let armed2 = Arc::clone(&armed);
        events.on_connected(Arc::new(move || {
            if armed2.fetch_add(1, Ordering::SeqCst) == 0 {
                events2.on_connected(Arc::clone(&late));
            }
        }));

        // Not part of the in-progress snapshot…
        events.notify_connected();
        assert_eq!(late_count.load(Ordering::SeqCst), 0);

        // …but live afterwards.
        events.notify_connected();
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
    }
}
