//! QA tests for entity identity, pruning and index backings.
//!
//! These tests drive a session through room transitions:
//! - Re-observing an entity returns the same allocation
//! - Decorations are backfilled, never overwritten
//! - Pruning honours both idle time and registry liveness
//! - The LRU backing bounds the index without breaking registries
//!
//! Run with: `cargo test -p gameobj-core --test qa_identity -- --nocapture`

use gameobj_core::{EntitySeed, GameObjConfig, RegistryKind, TestHarness};
use std::time::Duration;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn orc() -> EntitySeed {
    EntitySeed::new(1001, "orc", "a hulking orc")
}

fn coin() -> EntitySeed {
    EntitySeed::new(2002, "coin", "a silver coin")
}

// =============================================================================
// IDENTITY
// =============================================================================

#[test]
fn test_reentering_room_reuses_entities() {
    init_logging();
    let harness = TestHarness::new();
    let objs = &harness.objs;

    let first = objs.new_npc(orc(), None);
    objs.new_loot(coin());

    // Leave the room
    objs.clear_npcs();
    objs.clear_loot();
    harness.advance_secs(30);

    // Come back
    let second = objs.new_npc(orc(), Some("sleeping"));
    harness.assert_same(&first, &second);
    assert_eq!(objs.index_len(), 2);
    assert_eq!(harness.registry_len(RegistryKind::Npcs), 1);
    assert_eq!(objs.status_of(&second).as_deref(), Some("sleeping"));
}

#[test]
fn test_any_field_change_is_a_new_entity() {
    let harness = TestHarness::new();
    let objs = &harness.objs;

    let plain = objs.new_loot(EntitySeed::new(7, "sword", "a sword"));
    let renamed = objs.new_loot(EntitySeed::new(7, "sword", "a rusty sword"));
    let renumbered = objs.new_loot(EntitySeed::new(8, "sword", "a sword"));

    harness.assert_distinct(&plain, &renamed);
    harness.assert_distinct(&plain, &renumbered);
    assert_eq!(objs.index_len(), 3);
    assert_eq!(harness.registry_len(RegistryKind::Loot), 3);
}

#[test]
fn test_noun_normalization_shares_identity() {
    let harness = TestHarness::new();
    let objs = &harness.objs;

    let a = objs.new_inv(EntitySeed::new(9, "Hammer of Kai", "the Hammer of Kai"), None);
    let b = objs.new_loot(EntitySeed::new(9, "hammer", "the Hammer of Kai"));

    harness.assert_same(&a, &b);
    assert_eq!(a.noun.as_deref(), Some("hammer"));
}

#[test]
fn test_decorations_backfilled_not_overwritten() {
    let harness = TestHarness::new();
    let objs = &harness.objs;

    let bare = objs.new_loot(coin());
    assert!(bare.before_name.is_none());

    let decorated = objs.new_loot(coin().with_before_name("glinting"));
    harness.assert_same(&bare, &decorated);
    assert_eq!(decorated.before_name.as_deref(), Some("glinting"));

    let again = objs.new_loot(coin().with_before_name("dull").with_after_name("on the floor"));
    assert_eq!(again.before_name.as_deref(), Some("glinting"));
    assert_eq!(again.after_name.as_deref(), Some("on the floor"));

    // Older snapshots catch up through refresh
    let current = objs.refresh(&bare).unwrap();
    assert_eq!(current.full_name(), "glinting a silver coin on the floor");
}

#[test]
fn test_duplicate_push_is_ignored() {
    let harness = TestHarness::new();
    let objs = &harness.objs;

    objs.new_npc(orc(), None);
    objs.new_npc(orc(), None);
    objs.new_npc(orc(), None);

    assert_eq!(harness.registry_len(RegistryKind::Npcs), 1);
}

// =============================================================================
// TTL PRUNING
// =============================================================================

#[test]
fn test_prune_evicts_idle_unreferenced_entities() {
    init_logging();
    let harness = TestHarness::new();
    let objs = &harness.objs;
    let ttl = Duration::from_secs(300);

    let first = objs.new_loot(coin());
    objs.clear_loot();

    harness.advance_secs(300);
    let report = objs.prune(ttl, true);
    assert_eq!(report.removed, 0, "entries exactly at the TTL are kept");

    harness.advance_secs(1);
    let report = objs.prune(ttl, true);
    assert_eq!(report.removed, 1);
    assert_eq!(report.remaining, 0);
    assert!(report.memory_freed() > 0);
    assert!(objs.refresh(&first).is_none());

    // Seeing it again after eviction starts a fresh identity
    let second = objs.new_loot(coin());
    harness.assert_distinct(&first, &second);
}

#[test]
fn test_prune_keeps_entities_held_by_registries() {
    let harness = TestHarness::new();
    let objs = &harness.objs;
    let ttl = Duration::from_secs(60);

    objs.new_npc(orc(), None);
    objs.set_right_hand(EntitySeed::new(3, "sword", "a steel sword"));
    objs.new_inv(EntitySeed::new(4, "gem", "a red gem"), Some("500"));
    objs.new_fam_loot(EntitySeed::new(5, "feather", "a grey feather"));
    objs.new_loot(coin());
    objs.clear_loot();

    harness.advance_secs(3600);
    let report = objs.prune(ttl, false);

    assert_eq!(report.removed, 1);
    assert_eq!(report.skipped_live, 4);
    assert_eq!(report.remaining, 4);
    assert!(objs.find("sword").is_some());
    assert!(objs.find("gem").is_some());
}

#[test]
fn test_liveness_is_by_id() {
    let harness = TestHarness::new();
    let objs = &harness.objs;

    // Same id, different name: the old entry survives while the id is held
    objs.new_npc(EntitySeed::new(42, "guard", "a sleepy guard"), None);
    objs.clear_npcs();
    objs.new_npc(EntitySeed::new(42, "guard", "an alert guard"), None);

    harness.advance_secs(1000);
    let report = objs.prune(Duration::from_secs(60), false);
    assert_eq!(report.removed, 0);
    assert_eq!(objs.index_len(), 2);
}

#[test]
fn test_observation_refreshes_idle_time() {
    let harness = TestHarness::new();
    let objs = &harness.objs;
    let ttl = Duration::from_secs(100);

    objs.new_loot(coin());
    objs.clear_loot();
    harness.advance_secs(90);

    objs.new_loot(coin());
    objs.clear_loot();
    harness.advance_secs(90);

    assert_eq!(objs.prune(ttl, false).removed, 0);
    harness.advance_secs(20);
    assert_eq!(objs.prune(ttl, false).removed, 1);
}

#[test]
fn test_lookup_does_not_refresh() {
    let harness = TestHarness::new();
    let objs = &harness.objs;
    let ttl = Duration::from_secs(100);

    objs.new_loot(coin());
    objs.clear_loot();
    harness.advance_secs(90);
    assert!(objs.lookup("2002", Some("coin"), Some("a silver coin")).is_some());

    harness.advance_secs(20);
    assert_eq!(objs.prune(ttl, false).removed, 1);
}

#[test]
fn test_stats_match_prune() {
    let harness = TestHarness::new();
    let objs = &harness.objs;
    let ttl = Duration::from_secs(60);

    objs.new_npc(orc(), None);
    objs.new_loot(coin());
    objs.new_loot(EntitySeed::new(3, "gem", "a red gem"));
    objs.clear_loot();
    harness.advance_secs(120);

    let stats = objs.stats(ttl, true);
    assert_eq!(stats.total_entries, 3);
    assert_eq!(stats.live_count, 1);
    assert_eq!(stats.stale_count, 2);
    assert_eq!(stats.oldest_age_secs, 120);

    let report = objs.prune(ttl, false);
    assert_eq!(report.removed, stats.stale_count);
}

#[test]
fn test_prune_default_uses_configured_ttl() {
    let harness =
        TestHarness::with_config(GameObjConfig::new().with_default_ttl(Duration::from_secs(10)));
    let objs = &harness.objs;

    objs.new_loot(coin());
    objs.clear_loot();
    harness.advance_secs(11);

    assert_eq!(objs.stats_default().stale_count, 1);
    assert_eq!(objs.prune_default().removed, 1);
}

// =============================================================================
// LRU BACKING
// =============================================================================

#[test]
fn test_lru_bounds_index() {
    let harness = TestHarness::lru(2);
    let objs = &harness.objs;

    objs.new_loot(EntitySeed::new(1, "apple", "an apple"));
    objs.new_loot(EntitySeed::new(2, "pear", "a pear"));
    objs.new_loot(EntitySeed::new(3, "plum", "a plum"));

    assert_eq!(objs.index_len(), 2);
    assert!(objs.lookup("1", Some("apple"), Some("an apple")).is_none());

    // The registry still holds the evicted entity
    assert_eq!(harness.registry_len(RegistryKind::Loot), 3);
    assert!(objs.find("apple").is_some());
}

#[test]
fn test_lru_reobservation_swaps_registry_entry() {
    let harness = TestHarness::lru(2);
    let objs = &harness.objs;

    let apple = objs.new_loot(EntitySeed::new(1, "apple", "an apple"));
    objs.new_loot(EntitySeed::new(2, "pear", "a pear"));
    objs.new_loot(EntitySeed::new(3, "plum", "a plum"));

    let apple_again = objs.new_loot(EntitySeed::new(1, "apple", "an apple"));
    harness.assert_distinct(&apple, &apple_again);

    let loot = objs.loot().unwrap();
    assert_eq!(loot.len(), 3);
    assert!(loot[0].same_as(&apple_again), "replaced in place");
    assert!(objs.refresh(&apple).is_none());
}

#[test]
fn test_lru_repeat_observation_protects_entry() {
    let harness = TestHarness::lru(2);
    let objs = &harness.objs;

    let apple = objs.new_loot(EntitySeed::new(1, "apple", "an apple"));
    objs.new_loot(EntitySeed::new(2, "pear", "a pear"));
    objs.new_loot(EntitySeed::new(1, "apple", "an apple"));
    objs.new_loot(EntitySeed::new(3, "plum", "a plum"));

    let found = objs.lookup("1", Some("apple"), Some("an apple")).unwrap();
    harness.assert_same(&apple, &found);
    assert!(objs.lookup("2", Some("pear"), Some("a pear")).is_none());
}

#[test]
fn test_lru_prune_applies_ttl_and_liveness() {
    let harness = TestHarness::lru(10);
    let objs = &harness.objs;

    objs.new_npc(orc(), None);
    objs.new_loot(coin());
    objs.clear_loot();
    harness.advance_secs(120);

    let report = objs.prune(Duration::from_secs(60), false);
    assert_eq!(report.backing, "lru");
    assert_eq!(report.removed, 1);
    assert_eq!(report.remaining, 1);
}

#[test]
fn test_reset_then_reuse() {
    let harness = TestHarness::new();
    let objs = &harness.objs;

    let before = objs.new_npc(orc(), None);
    objs.reset();
    assert_eq!(objs.index_len(), 0);

    let after = objs.new_npc(orc(), None);
    harness.assert_distinct(&before, &after);
    assert_eq!(objs.resident_len(), 1);
}
