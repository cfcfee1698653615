//! Watch registry: the explicit allow-list of monitored keys.
//!
//! A key's entry *is* its state: registering a key creates its counters
//! zeroed, and an absent entry means every event for that key is ignored
//! without creating anything.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use connscale_core::MonitorKey;

use crate::error::{MonitorError, MonitorResult};

/// Per-key state. Each field is updated on its own with atomic
/// read-modify-write; no operation touches two keys.
#[derive(Debug, Default)]
pub struct KeyState {
    /// Live established connections, floor 0.
    pub(crate) count: AtomicU32,
    /// Consecutive out-of-band qualifying events.
    pub(crate) hysteresis: AtomicU32,
    /// Set when a signal latched; cleared only from outside.
    pub(crate) gate: AtomicBool,
}

impl KeyState {
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn hysteresis(&self) -> u32 {
        self.hysteresis.load(Ordering::Acquire)
    }

    pub fn is_gated(&self) -> bool {
        self.gate.load(Ordering::Acquire)
    }
}

/// Point-in-time view of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyStats {
    pub key: MonitorKey,
    pub count: u32,
    pub hysteresis: u32,
    pub gated: bool,
}

pub struct WatchRegistry {
    keys: DashMap<MonitorKey, Arc<KeyState>>,
    /// Entries reserved against `capacity`, including in-flight inserts.
    reserved: AtomicUsize,
    capacity: usize,
}

impl WatchRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: DashMap::with_capacity(capacity.min(4096)),
            reserved: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_watched(&self, key: &MonitorKey) -> bool {
        self.keys.contains_key(key)
    }

    /// Register a key with zeroed state.
    ///
    /// Returns `Ok(false)` when the key was already registered; its state is
    /// left untouched. Fails with `CapacityExceeded` once `capacity` keys are
    /// registered.
    pub fn register(&self, key: MonitorKey) -> MonitorResult<bool> {
        if self.keys.contains_key(&key) {
            return Ok(false);
        }

        let capacity = self.capacity;
        if self
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_err()
        {
            warn!(%key, capacity, "watch registry full, registration refused");
            return Err(MonitorError::CapacityExceeded { capacity });
        }

        match self.keys.entry(key) {
            Entry::Occupied(_) => {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                Ok(false)
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(KeyState::default()));
                debug!(%key, "key registered");
                Ok(true)
            }
        }
    }

    /// Drop a key and all of its state. Returns whether it was registered.
    pub fn unregister(&self, key: &MonitorKey) -> bool {
        if self.keys.remove(key).is_some() {
            self.reserved.fetch_sub(1, Ordering::AcqRel);
            debug!(%key, "key unregistered");
            true
        } else {
            false
        }
    }

    /// Shared handle to a key's state, if registered.
    pub fn state(&self, key: &MonitorKey) -> Option<Arc<KeyState>> {
        self.keys.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn stats(&self, key: &MonitorKey) -> Option<KeyStats> {
        self.keys.get(key).map(|entry| KeyStats {
            key: *key,
            count: entry.count(),
            hysteresis: entry.hysteresis(),
            gated: entry.is_gated(),
        })
    }

    /// Stats for every registered key, sorted by key.
    pub fn all_stats(&self) -> Vec<KeyStats> {
        let mut stats: Vec<KeyStats> = self
            .keys
            .iter()
            .map(|entry| KeyStats {
                key: *entry.key(),
                count: entry.count(),
                hysteresis: entry.hysteresis(),
                gated: entry.is_gated(),
            })
            .collect();
        stats.sort_by_key(|s| s.key);
        stats
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<MonitorKey> {
        let mut keys: Vec<MonitorKey> = self.keys.iter().map(|entry| *entry.key()).collect();
        keys.sort();
        keys
    }

    /// Clear a key's scaling gate. Returns whether it was set.
    pub fn clear_gate(&self, key: &MonitorKey) -> MonitorResult<bool> {
        let state = self.state(key).ok_or(MonitorError::UnknownKey(*key))?;
        Ok(state.gate.swap(false, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_creates_zeroed_state() {
        let registry = WatchRegistry::new(8);
        let key = MonitorKey::Netns(42);

        assert!(!registry.is_watched(&key));
        assert!(registry.register(key).unwrap());
        assert!(registry.is_watched(&key));
        assert_eq!(
            registry.stats(&key),
            Some(KeyStats {
                key,
                count: 0,
                hysteresis: 0,
                gated: false
            })
        );
    }

    #[test]
    fn reregister_keeps_state() {
        let registry = WatchRegistry::new(8);
        let key = MonitorKey::Port(8080);
        registry.register(key).unwrap();
        registry.state(&key).unwrap().count.store(5, Ordering::Release);

        assert!(!registry.register(key).unwrap());
        assert_eq!(registry.stats(&key).unwrap().count, 5);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_drops_state() {
        let registry = WatchRegistry::new(8);
        let key = MonitorKey::Port(8080);
        registry.register(key).unwrap();

        assert!(registry.unregister(&key));
        assert!(!registry.unregister(&key));
        assert!(registry.state(&key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn capacity_is_enforced_and_released() {
        let registry = WatchRegistry::new(2);
        registry.register(MonitorKey::Port(1)).unwrap();
        registry.register(MonitorKey::Port(2)).unwrap();

        assert_eq!(
            registry.register(MonitorKey::Port(3)),
            Err(MonitorError::CapacityExceeded { capacity: 2 })
        );
        // Re-registering an existing key is not a new reservation.
        assert_eq!(registry.register(MonitorKey::Port(2)), Ok(false));

        registry.unregister(&MonitorKey::Port(1));
        assert_eq!(registry.register(MonitorKey::Port(3)), Ok(true));
    }

    #[test]
    fn clear_gate_reports_previous_value() {
        let registry = WatchRegistry::new(8);
        let key = MonitorKey::Netns(1);
        registry.register(key).unwrap();

        assert_eq!(registry.clear_gate(&key), Ok(false));
        registry.state(&key).unwrap().gate.store(true, Ordering::Release);
        assert_eq!(registry.clear_gate(&key), Ok(true));
        assert!(!registry.stats(&key).unwrap().gated);

        assert_eq!(
            registry.clear_gate(&MonitorKey::Netns(2)),
            Err(MonitorError::UnknownKey(MonitorKey::Netns(2)))
        );
    }

    #[test]
    fn keys_are_sorted() {
        let registry = WatchRegistry::new(8);
        registry.register(MonitorKey::Port(9)).unwrap();
        registry.register(MonitorKey::Netns(3)).unwrap();
        registry.register(MonitorKey::Port(1)).unwrap();

        assert_eq!(
            registry.keys(),
            vec![MonitorKey::Netns(3), MonitorKey::Port(1), MonitorKey::Port(9)]
        );
    }
}
