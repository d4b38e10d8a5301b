//! Prune and statistics reports for the identity index.

use crate::arena::EntityArena;
use crate::index::{judge, IdentityIndex, PruneCounts, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

/// Fixed per-entry cost for the key's map slot.
const ENTRY_OVERHEAD: usize = 48;

/// Upper bounds (exclusive, seconds) of the first four age buckets.
const BUCKET_BOUNDS: [u64; 4] = [60, 5 * 60, 15 * 60, 60 * 60];

/// Labels for the age buckets.
pub const BUCKET_LABELS: [&str; 5] = ["<1m", "1-5m", "5-15m", "15-60m", ">=60m"];

/// Result of a prune pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    /// Index implementation that was pruned.
    pub backing: String,
    /// TTL applied, in seconds.
    pub ttl_secs: u64,
    /// Entries evicted.
    pub removed: usize,
    /// Entries kept because a registry holds their id.
    pub skipped_live: usize,
    /// Entries left in the index.
    pub remaining: usize,
    /// Estimated bytes before the pass.
    pub memory_before: usize,
    /// Estimated bytes after the pass.
    pub memory_after: usize,
}

impl PruneReport {
    pub(crate) fn new(
        backing: &str,
        ttl: Duration,
        counts: PruneCounts,
        memory_before: usize,
        memory_after: usize,
    ) -> Self {
        Self {
            backing: backing.to_string(),
            ttl_secs: ttl.as_secs(),
            removed: counts.removed,
            skipped_live: counts.skipped_live,
            remaining: counts.remaining,
            memory_before,
            memory_after,
        }
    }

    /// Bytes released by the pass.
    pub fn memory_freed(&self) -> usize {
        self.memory_before.saturating_sub(self.memory_after)
    }
}

impl fmt::Display for PruneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pruned {} of {} entries (ttl {}s, {} kept live), ~{} bytes freed",
            self.removed,
            self.removed + self.remaining,
            self.ttl_secs,
            self.skipped_live,
            self.memory_freed()
        )
    }
}

/// Count of entries per idle-age bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeHistogram {
    pub buckets: [usize; 5],
}

impl AgeHistogram {
    fn record(&mut self, age: Duration) {
        let secs = age.as_secs();
        let bucket = BUCKET_BOUNDS
            .iter()
            .position(|&bound| secs < bound)
            .unwrap_or(BUCKET_BOUNDS.len());
        self.buckets[bucket] += 1;
    }

    /// Buckets paired with their labels.
    pub fn labelled(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        BUCKET_LABELS.iter().copied().zip(self.buckets.iter().copied())
    }
}

/// Snapshot of index health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub backing: String,
    pub total_entries: usize,
    /// Entries whose id some registry currently holds.
    pub live_count: usize,
    /// Entries a prune with the same TTL would remove.
    pub stale_count: usize,
    pub oldest_age_secs: u64,
    pub age_histogram: AgeHistogram,
    pub estimated_memory: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} index: {} entries ({} live, {} stale), oldest {}s, ~{} bytes [",
            self.backing,
            self.total_entries,
            self.live_count,
            self.stale_count,
            self.oldest_age_secs,
            self.estimated_memory
        )?;
        let buckets: Vec<String> = self
            .age_histogram
            .labelled()
            .map(|(label, count)| format!("{} {}", label, count))
            .collect();
        write!(f, "{}]", buckets.join(", "))
    }
}

/// Rough byte cost of the index and the entities it reaches.
pub(crate) fn estimate_memory(index: &dyn IdentityIndex, arena: &EntityArena) -> usize {
    let keys: usize = index
        .entries()
        .map(|entry| entry.key.len() + ENTRY_OVERHEAD)
        .sum();
    keys + arena.estimated_bytes()
}

pub(crate) fn collect_stats(
    index: &dyn IdentityIndex,
    arena: &EntityArena,
    live: &HashSet<String>,
    ttl: Duration,
    now: Instant,
) -> IndexStats {
    let mut stats = IndexStats {
        backing: index.backing().to_string(),
        total_entries: index.len(),
        live_count: 0,
        stale_count: 0,
        oldest_age_secs: 0,
        age_histogram: AgeHistogram::default(),
        estimated_memory: estimate_memory(index, arena),
    };

    for entry in index.entries() {
        let age = now.saturating_duration_since(entry.last_seen);
        stats.oldest_age_secs = stats.oldest_age_secs.max(age.as_secs());
        stats.age_histogram.record(age);
        match judge(arena, &entry, live, ttl, now) {
            Verdict::Live => stats.live_count += 1,
            Verdict::Evict => stats.stale_count += 1,
            Verdict::Keep => {}
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntitySeed;
    use crate::index::TtlIndex;

    #[test]
    fn test_histogram_buckets() {
        let mut histogram = AgeHistogram::default();
        for secs in [0, 59, 60, 299, 300, 899, 900, 3599, 3600, 86_400] {
            histogram.record(Duration::from_secs(secs));
        }
        assert_eq!(histogram.buckets, [2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_stats_classify_entries() {
        let mut index = TtlIndex::new();
        let mut arena = EntityArena::new();
        let start = Instant::now();

        index.get_or_create(&mut arena, EntitySeed::new(1, "cat", "a cat"), start);
        index.get_or_create(&mut arena, EntitySeed::new(2, "rock", "a rock"), start);
        let later = start + Duration::from_secs(400);
        index.get_or_create(&mut arena, EntitySeed::new(3, "leaf", "a leaf"), later);

        let live: HashSet<String> = ["1".to_string()].into_iter().collect();
        let stats = collect_stats(&index, &arena, &live, Duration::from_secs(300), later);

        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.live_count, 1);
        assert_eq!(stats.stale_count, 1);
        assert_eq!(stats.oldest_age_secs, 400);
        assert_eq!(stats.age_histogram.buckets, [1, 0, 2, 0, 0]);
        assert!(stats.estimated_memory > 0);

        let line = stats.to_string();
        assert!(line.starts_with("ttl index: 3 entries (1 live, 1 stale)"));
    }

    #[test]
    fn test_report_memory_freed() {
        let report = PruneReport::new(
            "ttl",
            Duration::from_secs(60),
            PruneCounts {
                removed: 2,
                skipped_live: 1,
                remaining: 3,
            },
            1000,
            600,
        );
        assert_eq!(report.memory_freed(), 400);
        assert_eq!(
            report.to_string(),
            "pruned 2 of 5 entries (ttl 60s, 1 kept live), ~400 bytes freed"
        );
    }
}
