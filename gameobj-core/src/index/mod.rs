//! Identity index: composite key to entity, with two eviction policies.
//!
//! [`TtlIndex`] keeps entries until [`IdentityIndex::prune`] finds them idle
//! and unreferenced. [`LruIndex`] additionally bounds the entry count and
//! evicts the least recently used entry on overflow, without a liveness
//! check.

mod lru;
mod ttl;

pub use self::lru::LruIndex;
pub use self::ttl::TtlIndex;

use crate::arena::EntityArena;
use crate::entity::{Entity, EntityHandle};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// One index entry, borrowed for inspection.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry<'a> {
    pub key: &'a str,
    pub handle: EntityHandle,
    pub last_seen: Instant,
}

/// Counts from one prune pass over an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneCounts {
    pub removed: usize,
    pub skipped_live: usize,
    pub remaining: usize,
}

/// Deduplicating entity index.
///
/// Implementations own one arena reference per entry and release it when
/// the entry leaves the index.
pub trait IdentityIndex: Send {
    /// Short name of the eviction policy, for reports.
    fn backing(&self) -> &'static str;

    /// Return the entity for the seed's key, creating it on first sight.
    ///
    /// A hit refreshes the entry's last-seen time and backfills unset
    /// decorations from the seed.
    fn get_or_create(
        &mut self,
        arena: &mut EntityArena,
        seed: crate::entity::EntitySeed,
        now: Instant,
    ) -> Entity;

    /// Look up a key without refreshing its last-seen time.
    fn get(&mut self, key: &str) -> Option<EntityHandle>;

    /// Remove entries whose id is not in `live` and that have been idle for
    /// longer than `ttl`.
    fn prune(
        &mut self,
        arena: &mut EntityArena,
        live: &HashSet<String>,
        ttl: Duration,
        now: Instant,
    ) -> PruneCounts;

    /// Iterate over entries without touching recency.
    fn entries(&self) -> Box<dyn Iterator<Item = IndexEntry<'_>> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    fn clear(&mut self, arena: &mut EntityArena);
}

/// Whether an entry may be evicted by a prune pass.
pub(crate) enum Verdict {
    Keep,
    Live,
    Evict,
}

pub(crate) fn judge(
    arena: &EntityArena,
    entry: &IndexEntry<'_>,
    live: &HashSet<String>,
    ttl: Duration,
    now: Instant,
) -> Verdict {
    let is_live = arena
        .get(entry.handle)
        .is_some_and(|entity| live.contains(&entity.id));
    if is_live {
        return Verdict::Live;
    }
    if now.saturating_duration_since(entry.last_seen) > ttl {
        Verdict::Evict
    } else {
        Verdict::Keep
    }
}

/// Collect the keys a prune pass should remove.
pub(crate) fn stale_keys(
    index: &dyn IdentityIndex,
    arena: &EntityArena,
    live: &HashSet<String>,
    ttl: Duration,
    now: Instant,
) -> (Vec<String>, usize) {
    let mut stale = Vec::new();
    let mut skipped_live = 0;
    for entry in index.entries() {
        match judge(arena, &entry, live, ttl, now) {
            Verdict::Evict => stale.push(entry.key.to_string()),
            Verdict::Live => skipped_live += 1,
            Verdict::Keep => {}
        }
    }
    (stale, skipped_live)
}
