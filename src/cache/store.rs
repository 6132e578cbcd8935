//! Cache storage: the pluggable backend contract and the in-memory default.
//!
//! A store maps string keys to opaque byte values with an absolute expiration
//! instant. An entry may be tagged with a *group* key; removing the group key
//! makes every entry of that group unavailable without the caller having to
//! enumerate them.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use super::error::StoreError;

/// Backend contract for output caching.
///
/// Missing and expired entries are reported as absent (`Ok(None)` /
/// `Ok(false)`), never as errors. Implementations must tolerate concurrent
/// calls from overlapping requests: a read racing a write for the same key
/// returns either the old or the new value, never a partial one.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `true` when a live entry exists for `key`.
    async fn contains(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns the live value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Stores `value` under `key` until `expires_at`, replacing any previous
    /// value. When `group` is given the entry is registered with that group.
    async fn add(
        &self,
        key: &str,
        value: Bytes,
        expires_at: OffsetDateTime,
        group: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Removes `key`. If `key` is a group key, every entry registered with the
    /// group becomes unavailable as well.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Makes every entry registered with `group` unavailable.
    async fn invalidate_group(&self, group: &str) -> Result<(), StoreError> {
        self.remove(group).await
    }
}

/// Typed access on top of the byte-level [`CacheStore`] contract.
///
/// Asking for a type other than the one stored is a caller error and surfaces
/// as [`StoreError::Decode`].
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.get(key).await? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| StoreError::decode(key, e)),
            None => Ok(None),
        }
    }

    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::decode(key, e)),
            None => Ok(None),
        }
    }

    async fn add_string(
        &self,
        key: &str,
        value: &str,
        expires_at: OffsetDateTime,
        group: Option<&str>,
    ) -> Result<(), StoreError> {
        self.add(key, Bytes::copy_from_slice(value.as_bytes()), expires_at, group)
            .await
    }

    async fn add_json<T>(
        &self,
        key: &str,
        value: &T,
        expires_at: OffsetDateTime,
        group: Option<&str>,
    ) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let encoded = serde_json::to_vec(value).map_err(|e| StoreError::decode(key, e))?;
        self.add(key, Bytes::from(encoded), expires_at, group).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

struct Slot {
    value: Bytes,
    expires_at: OffsetDateTime,
    // Group key and the group generation current when the entry was written.
    group: Option<(String, u64)>,
}

/// In-process [`CacheStore`] backed by a sharded [`DashMap`].
///
/// Group invalidation bumps a per-group generation counter; entries written
/// under an older generation are treated as absent and evicted lazily, so
/// invalidation is O(1) whatever the group's size. An entry written after the
/// invalidation carries the new generation and stays valid.
///
/// Reads evict what they find stale; [`spawn_purger`](Self::spawn_purger)
/// reclaims entries nobody reads again.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
    generations: DashMap<String, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones not yet lazily evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired or invalidated entry, then the generation
    /// counters of groups no remaining entry belongs to.
    pub fn purge_expired(&self) {
        let now = OffsetDateTime::now_utc();
        let before = self.entries.len();
        self.entries.retain(|_, slot| self.is_live(slot, now));

        let referenced: HashSet<String> = self
            .entries
            .iter()
            .filter_map(|entry| entry.value().group.as_ref().map(|(group, _)| group.clone()))
            .collect();
        self.generations.retain(|group, _| referenced.contains(group));

        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(cache = "memory", purged, "purged stale cache entries");
        }
    }

    /// Runs [`purge_expired`](Self::purge_expired) every `every` on the
    /// current tokio runtime. The task ends once the store is dropped.
    pub fn spawn_purger(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    trace!("cache store dropped, purger exiting");
                    break;
                };
                store.purge_expired();
            }
        })
    }

    /// Number of groups with a live generation counter.
    pub fn tracked_groups(&self) -> usize {
        self.generations.len()
    }

    fn generation(&self, group: &str) -> u64 {
        self.generations.get(group).map_or(0, |g| *g)
    }

    fn is_live(&self, slot: &Slot, now: OffsetDateTime) -> bool {
        if slot.expires_at <= now {
            return false;
        }
        match &slot.group {
            Some((group, generation)) => self.generation(group) == *generation,
            None => true,
        }
    }

    fn live_value(&self, key: &str) -> Option<Bytes> {
        let now = OffsetDateTime::now_utc();
        let value = {
            let slot = self.entries.get(key)?;
            self.is_live(&slot, now).then(|| slot.value.clone())
        };
        if value.is_none() {
            // Re-check under the shard lock so a concurrent fresh write survives.
            self.entries.remove_if(key, |_, slot| !self.is_live(slot, now));
            trace!(key, "evicted stale cache entry");
        }
        value
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live_value(key).is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.live_value(key))
    }

    async fn add(
        &self,
        key: &str,
        value: Bytes,
        expires_at: OffsetDateTime,
        group: Option<&str>,
    ) -> Result<(), StoreError> {
        let group = group.map(|g| {
            let generation = *self.generations.entry(g.to_owned()).or_insert(0);
            (g.to_owned(), generation)
        });
        self.entries.insert(
            key.to_owned(),
            Slot {
                value,
                expires_at,
                group,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        // Only keys with registered members are groups.
        if let Some(mut generation) = self.generations.get_mut(key) {
            *generation += 1;
        }
        Ok(())
    }
}
