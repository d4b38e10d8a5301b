//! Time-to-live identity index.

use super::{stale_keys, IdentityIndex, IndexEntry, PruneCounts};
use crate::arena::EntityArena;
use crate::entity::{Entity, EntityHandle, EntitySeed};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Entry {
    handle: EntityHandle,
    last_seen: Instant,
}

/// Unbounded index; entries leave only through [`IdentityIndex::prune`].
#[derive(Debug, Default)]
pub struct TtlIndex {
    entries: HashMap<String, Entry>,
}

impl TtlIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityIndex for TtlIndex {
    fn backing(&self) -> &'static str {
        "ttl"
    }

    fn get_or_create(&mut self, arena: &mut EntityArena, seed: EntitySeed, now: Instant) -> Entity {
        let seed = seed.normalized();
        let key = seed.key();

        if let Some(entry) = self.entries.get_mut(&key) {
            if let Some(entity) = arena.get_mut(entry.handle) {
                entry.last_seen = now;
                entity.backfill(seed.before_name, seed.after_name);
                return entity.clone();
            }
        }

        let entity = arena.insert(seed).clone();
        tracing::debug!(key = %key, "new entity");
        self.entries.insert(
            key,
            Entry {
                handle: entity.handle,
                last_seen: now,
            },
        );
        entity
    }

    fn get(&mut self, key: &str) -> Option<EntityHandle> {
        self.entries.get(key).map(|entry| entry.handle)
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
            if let Some(entry) = self.entries.remove(key) {
                arena.release(entry.handle);
                tracing::debug!(key = %key, "evicted idle entity");
            }
        }

        PruneCounts {
            removed: stale.len(),
            skipped_live,
            remaining: self.entries.len(),
        }
    }

    fn entries(&self) -> Box<dyn Iterator<Item = IndexEntry<'_>> + '_> {
        Box::new(self.entries.iter().map(|(key, entry)| IndexEntry {
            key,
            handle: entry.handle,
            last_seen: entry.last_seen,
        }))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self, arena: &mut EntityArena) {
        for (_, entry) in self.entries.drain() {
            arena.release(entry.handle);
        }
    }
}
