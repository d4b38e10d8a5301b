//! Testing utilities for sessions.
//!
//! This module provides tools for integration testing:
//! - `TestHarness` pairing a session with a manually driven clock
//! - Sample classification data and a helper to write it to disk
//! - Assertion helpers for entity identity and registry contents

use crate::clock::ManualClock;
use crate::config::GameObjConfig;
use crate::entity::Entity;
use crate::registry::RegistryKind;
use crate::store::GameObjs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Classification data covering gems, hostile creatures and containers.
pub const SAMPLE_CLASSIFICATION_XML: &str = r#"<?xml version="1.0"?>
<data>
  <type name="gem">
    <name>\b(?:ruby|emerald|sapphire)\b</name>
    <noun>^(?:ruby|emerald|sapphire)$</noun>
    <exclude>\bfake\b</exclude>
  </type>
  <type name="aggressive npc">
    <name>\b(?:troll|goblin|kobold)$</name>
  </type>
  <type name="troll">
    <noun>^troll$</noun>
  </type>
  <type name="companion">
    <name>^(?:a|an) (?:loyal|faithful) </name>
  </type>
  <type name="box">
    <noun>^(?:box|chest|coffer|strongbox)$</noun>
  </type>
  <sellable name="gemshop">
    <name>\b(?:ruby|emerald|sapphire)\b</name>
    <exclude>\bfake\b</exclude>
  </sellable>
  <sellable name="pawnshop">
    <noun>^(?:box|chest|coffer)$</noun>
  </sellable>
</data>
"#;

/// File name of the classification data inside a data directory.
pub const DATA_FILE_NAME: &str = "gameobj-data.xml";

/// Write classification data into `dir`, returning the file path.
pub fn write_classification(dir: &Path, xml: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(DATA_FILE_NAME);
    std::fs::write(&path, xml)?;
    Ok(path)
}

/// Write a custom override file beside the data file in `dir`.
pub fn write_custom_classification(dir: &Path, xml: &str) -> std::io::Result<PathBuf> {
    write_classification(&dir.join(crate::classify::CUSTOM_DIR), xml)
}

/// A session driven by a manual clock.
pub struct TestHarness {
    /// Clock shared with the session.
    pub clock: Arc<ManualClock>,
    /// The session under test.
    pub objs: GameObjs,
}

impl TestHarness {
    /// Create a harness with the default (TTL) configuration.
    pub fn new() -> Self {
        Self::with_config(GameObjConfig::default())
    }

    /// Create a harness with a custom configuration.
    ///
    /// Panics if `config` is invalid.
    pub fn with_config(config: GameObjConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("Invalid harness config: {}", e);
        }
        let clock = Arc::new(ManualClock::new());
        let objs = GameObjs::build(config, clock.clone());
        Self { clock, objs }
    }

    /// Create a harness with an LRU index of the given capacity.
    pub fn lru(capacity: usize) -> Self {
        Self::with_config(GameObjConfig::new().with_lru(capacity))
    }

    /// Advance the session clock by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    /// Length of a flat registry, zero when it reports no data.
    pub fn registry_len(&self, kind: RegistryKind) -> usize {
        self.objs.registry(kind).map_or(0, |list| list.len())
    }

    /// Assert two snapshots name the same allocation.
    pub fn assert_same(&self, a: &Entity, b: &Entity) {
        assert!(
            a.same_as(b),
            "Expected the same entity, got {:?} and {:?}",
            a.handle,
            b.handle
        );
    }

    /// Assert two snapshots name different allocations.
    pub fn assert_distinct(&self, a: &Entity, b: &Entity) {
        assert!(
            !a.same_as(b),
            "Expected distinct entities, both are {:?}",
            a.handle
        );
    }

    /// Assert a lookup resolves to the given entity.
    pub fn assert_finds(&self, query: &str, expected: &Entity) {
        match self.objs.find(query) {
            Some(found) => assert!(
                found.same_as(expected),
                "'{}' resolved to '{}' instead of '{}'",
                query,
                found.name_str(),
                expected.name_str()
            ),
            None => panic!("'{}' resolved to nothing", query),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
