//! Counter store abstraction for rate limit state.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use crate::error::Result;

/// Shared key-value store holding expiring rate limit counters.
///
/// Implementations must make `add` and `incr` atomic with respect to
/// concurrent callers, including callers in other processes when the
/// store is shared.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Set `key` to `value` with the given time to live, only if the key is
    /// absent. Returns `true` when the value was stored.
    async fn add(&self, key: &str, value: u64, ttl: Duration) -> Result<bool>;

    /// Atomically add `delta` to an existing key and return the new value.
    ///
    /// Returns `None` when the key does not exist or has expired; the key is
    /// never created by this call.
    async fn incr(&self, key: &str, delta: u64) -> Result<Option<u64>>;

    /// Read the current value of a key.
    async fn get(&self, key: &str) -> Result<Option<u64>>;
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    value: u64,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process counter store.
///
/// Suitable for a single server process and for tests. Expired entries read
/// as absent; call [`MemoryCounterStore::purge_expired`] periodically to
/// reclaim their memory.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    slots: DashMap<String, Slot>,
}

impl MemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_live(now));
        let purged = before.saturating_sub(self.slots.len());
        trace!(purged, "Purged expired rate limit counters");
        purged
    }

    /// Number of stored entries, live or not yet purged.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn add(&self, key: &str, value: u64, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let fresh = Slot {
            value,
            expires_at: now.checked_add(ttl),
        };
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    Ok(false)
                } else {
                    occupied.insert(fresh);
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn incr(&self, key: &str, delta: u64) -> Result<Option<u64>> {
        let now = Instant::now();
        match self.slots.get_mut(key) {
            Some(mut slot) if slot.is_live(now) => {
                slot.value = slot.value.saturating_add(delta);
                Ok(Some(slot.value))
            }
            _ => Ok(None),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<u64>> {
        let now = Instant::now();
        Ok(self
            .slots
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value))
    }
}
