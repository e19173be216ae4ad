//! Keyed listener registry for inbound frame dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rmpv::Value;

/// Callback invoked with a dispatched frame's payload.
pub(crate) type ListenerCallback = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// Composite lookup key: one (opcode, category) message class.
///
/// Equality and hashing are structural, so two keys built separately from
/// the same integers land in the same registry slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ListenerKey {
    /// Opcode half of the class.
    pub opcode: u16,
    /// Category half of the class.
    pub category: u16,
}

struct Subscription {
    /// Registration order, unique across the registry's lifetime. Pruning
    /// after dispatch targets these, so entries added mid-dispatch survive.
    seq: u64,
    onetime: bool,
    callback: ListenerCallback,
}

struct RegistryInner {
    next_seq: u64,
    listeners: HashMap<ListenerKey, Vec<Subscription>>,
}

/// Ordered subscription lists per key.
///
/// Dispatch iterates over a snapshot taken under the lock and invokes
/// callbacks outside it, so a callback may register on the same key (or
/// tear the connection down) without corrupting the in-progress iteration.
pub(crate) struct ListenerRegistry {
    inner: Mutex<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_seq: 0,
                listeners: HashMap::new(),
            }),
        }
    }

    /// Append a subscription for `key`, preserving registration order.
    pub fn register(&self, key: ListenerKey, callback: ListenerCallback, onetime: bool) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.listeners.entry(key).or_default().push(Subscription {
            seq,
            onetime,
            callback,
        });
    }

    /// Invoke every current subscription for `key` in registration order,
    /// then remove the onetime entries that were just dispatched. The
    /// removal mutates the stored list, not a copy. Returns the number of
    /// callbacks invoked.
    pub fn dispatch(&self, key: ListenerKey, payload: Option<&Value>) -> usize {
        let snapshot: Vec<(u64, bool, ListenerCallback)> = {
            let inner = self.inner.lock();
            let Some(subscriptions) = inner.listeners.get(&key) else {
                return 0;
            };
            subscriptions
                .iter()
                .map(|s| (s.seq, s.onetime, Arc::clone(&s.callback)))
                .collect()
        };

        for (_, _, callback) in &snapshot {
            callback(payload.cloned());
        }

        let spent: Vec<u64> = snapshot
            .iter()
            .filter(|(_, onetime, _)| *onetime)
            .map(|(seq, _, _)| *seq)
            .collect();
        if !spent.is_empty() {
            let mut inner = self.inner.lock();
            if let Some(subscriptions) = inner.listeners.get_mut(&key) {
                subscriptions.retain(|s| !spent.contains(&s.seq));
                if subscriptions.is_empty() {
                    let _ = inner.listeners.remove(&key);
                }
            }
        }

        snapshot.len()
    }

    /// Drop every subscription. Called on connection teardown so stale
    /// callbacks never fire on a later reconnect.
    pub fn clear(&self) {
        self.inner.lock().listeners.clear();
    }

    /// Number of live subscriptions for `key`.
    #[cfg(test)]
    pub fn count(&self, key: ListenerKey) -> usize {
        self.inner
            .lock()
            .listeners
            .get(&key)
            .map_or(0, Vec::len)
    }
}
