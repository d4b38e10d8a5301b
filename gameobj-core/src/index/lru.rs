//! Count-bounded identity index with least-recently-used eviction.
//!
//! Overflow evicts without consulting registries, so an entity that sits
//! untouched in a registry longer than `capacity` other observations will be
//! reallocated the next time it is seen.

use super::{stale_keys, IdentityIndex, IndexEntry, PruneCounts};
use crate::arena::EntityArena;
use crate::entity::{Entity, EntityHandle, EntitySeed};
use ::lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Entry {
    handle: EntityHandle,
    last_seen: Instant,
}

/// Index holding at most `capacity` entries.
#[derive(Debug)]
pub struct LruIndex {
    cache: LruCache<String, Entry>,
}

impl LruIndex {
    /// Create an index; a zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// Key that the next overflow would evict.
    pub fn eviction_candidate(&self) -> Option<&str> {
        self.cache.peek_lru().map(|(key, _)| key.as_str())
    }
}

impl IdentityIndex for LruIndex {
    fn backing(&self) -> &'static str {
        "lru"
    }

    fn get_or_create(&mut self, arena: &mut EntityArena, seed: EntitySeed, now: Instant) -> Entity {
        let seed = seed.normalized();
        let key = seed.key();

        if let Some(entry) = self.cache.get_mut(&key) {
            if let Some(entity) = arena.get_mut(entry.handle) {
                entry.last_seen = now;
                entity.backfill(seed.before_name, seed.after_name);
                return entity.clone();
            }
        }

        let entity = arena.insert(seed).clone();
        tracing::debug!(key = %key, "new entity");
        let entry = Entry {
            handle: entity.handle,
            last_seen: now,
        };
        if let Some((evicted_key, evicted)) = self.cache.push(key, entry) {
            if evicted.handle != entity.handle {
                arena.release(evicted.handle);
                tracing::debug!(key = %evicted_key, "evicted least recently used entity");
            }
        }
        entity
    }

    fn get(&mut self, key: &str) -> Option<EntityHandle> {
        self.cache.get(key).map(|entry| entry.handle)
    }

    fn prune(
        &mut self,
        arena: &mut EntityArena,
        live: &HashSet<String>,
        ttl: Duration,
        now: Instant,
    ) -> PruneCounts {
        let (stale, skipped_live) = stale_keys(self, arena, live, ttl, now);

        for key in &stale {
            if let Some(entry) = self.cache.pop(key) {
                arena.release(entry.handle);
                tracing::debug!(key = %key, "evicted idle entity");
            }
        }

        PruneCounts {
            removed: stale.len(),
            skipped_live,
            remaining: self.cache.len(),
        }
    }

    fn entries(&self) -> Box<dyn Iterator<Item = IndexEntry<'_>> + '_> {
        Box::new(self.cache.iter().map(|(key, entry)| IndexEntry {
            key,
            handle: entry.handle,
            last_seen: entry.last_seen,
        }))
    }

    fn len(&self) -> usize {
        self.cache.len()
    }

    fn clear(&mut self, arena: &mut EntityArena) {
        while let Some((_, entry)) = self.cache.pop_lru() {
            arena.release(entry.handle);
        }
    }
}
