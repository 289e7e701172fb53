//! Keyed reactive cache with per-key subscriber notification.
//!
//! The store is the only shared mutable resource between the mutation
//! engine and the realtime reconciler. It performs no I/O itself; its only
//! side effect is notifying subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::trace;

use crate::key::CacheKey;
use crate::value::CacheValue;

/// Snapshot delivered to subscribers on every change to their key.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub key: CacheKey,
    /// Current value, absent if the entry has no value (yet or again).
    pub value: Option<CacheValue>,
    /// Whether the entry is flagged for background refresh.
    pub is_stale: bool,
}

type SubscriberCallback = Arc<dyn Fn(&CacheEvent) + Send + Sync>;
type SubscriberRegistry = DashMap<CacheKey, HashMap<u64, SubscriberCallback>>;

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    value: Option<CacheValue>,
    is_stale: bool,
}

/// Keyed table mapping a cache key to its current value, a staleness flag,
/// and a set of subscribers to notify on change.
///
/// Constructed explicitly and shared via `Arc`; tests instantiate isolated
/// stores instead of sharing a process-wide singleton. Entries are created
/// on first use and live for the store's lifetime, which spans the
/// authenticated session.
pub struct CacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
    subscribers: Arc<SubscriberRegistry>,
    next_subscriber_id: AtomicU64,
}

impl CacheStore {
    /// Create a new empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            subscribers: Arc::new(DashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
        })
    }

    /// Read the current value of a key, if any.
    pub fn read(&self, key: &CacheKey) -> Option<CacheValue> {
        self.entries.get(key).and_then(|e| e.value.clone())
    }

    /// Whether a key is flagged for background refresh.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.entries.get(key).map(|e| e.is_stale).unwrap_or(false)
    }

    /// Write one value, clearing the stale flag, and notify subscribers
    /// of the key immediately.
    pub fn write(&self, key: CacheKey, value: CacheValue) {
        self.write_all(vec![(key, value)]);
    }

    /// Apply a batch of writes, then notify.
    ///
    /// Every write lands before the first notification fires, so a
    /// subscriber triggered by one key of a multi-key mutation observes all
    /// of its sibling keys already updated. This is what keeps a toggle's
    /// status and count from ever disagreeing mid-notification.
    pub fn write_all(&self, writes: Vec<(CacheKey, CacheValue)>) {
        let events: Vec<CacheEvent> = writes
            .into_iter()
            .map(|(key, value)| {
                let mut entry = self.entries.entry(key.clone()).or_default();
                entry.value = Some(value.clone());
                entry.is_stale = false;
                CacheEvent {
                    key,
                    value: Some(value),
                    is_stale: false,
                }
            })
            .collect();

        for event in &events {
            self.notify(event);
        }
    }

    /// Write back a pre-mutation snapshot, absent entries included.
    ///
    /// Same all-then-notify ordering as `write_all`: the entire snapshot is
    /// restored within one notification cycle.
    pub fn restore_all(&self, snapshot: Vec<(CacheKey, Option<CacheValue>)>) {
        let events: Vec<CacheEvent> = snapshot
            .into_iter()
            .map(|(key, value)| {
                let mut entry = self.entries.entry(key.clone()).or_default();
                entry.value = value.clone();
                entry.is_stale = false;
                CacheEvent {
                    key,
                    value,
                    is_stale: false,
                }
            })
            .collect();

        for event in &events {
            self.notify(event);
        }
    }

    /// Flag a key for background refresh without clearing its current
    /// value, so the UI never flashes empty. Subscribers are notified so
    /// they can kick off the refetch.
    pub fn mark_stale(&self, key: &CacheKey) {
        let value = {
            let mut entry = self.entries.entry(key.clone()).or_default();
            entry.is_stale = true;
            entry.value.clone()
        };
        self.notify(&CacheEvent {
            key: key.clone(),
            value,
            is_stale: true,
        });
    }

    /// Subscribe to changes of one key.
    ///
    /// The returned `Subscription` removes the callback when dropped or
    /// explicitly unsubscribed.
    pub fn subscribe(
        &self,
        key: CacheKey,
        callback: impl Fn(&CacheEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .entry(key.clone())
            .or_default()
            .insert(id, Arc::new(callback));
        Subscription {
            registry: Arc::clone(&self.subscribers),
            key,
            id,
        }
    }

    /// Number of subscribers registered for a key.
    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.subscribers.get(key).map(|s| s.len()).unwrap_or(0)
    }

    fn notify(&self, event: &CacheEvent) {
        // Clone callbacks out before invoking so a callback that touches the
        // store cannot deadlock against the registry shard lock.
        let callbacks: Vec<SubscriberCallback> = match self.subscribers.get(&event.key) {
            Some(subs) => subs.values().cloned().collect(),
            None => {
                trace!(key = %event.key, "no subscribers for cache update");
                return;
            }
        };
        for callback in callbacks {
            callback(event);
        }
    }
}

/// Handle returned from [`CacheStore::subscribe`].
///
/// Dropping it (or calling [`Subscription::unsubscribe`]) removes the
/// callback from the store.
pub struct Subscription {
    registry: Arc<SubscriberRegistry>,
    key: CacheKey,
    id: u64,
}

impl Subscription {
    /// Explicitly remove the callback. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mut subs) = self.registry.get_mut(&self.key) {
            subs.remove(&self.id);
        }
    }
}
