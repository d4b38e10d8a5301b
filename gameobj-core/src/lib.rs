//! Session entity cache for game clients.
//!
//! This crate provides:
//! - Identity deduplication of revealed entities by `id|noun|name`
//! - Per-category registries (NPCs, PCs, loot, inventory, containers, hands,
//!   room and familiar views) over one shared entity arena
//! - TTL pruning guarded by registry liveness, or an LRU-bounded index
//! - Fuzzy lookup by id, noun, name suffix or pattern
//! - Regex type/sellable classification loaded from XML
//!
//! # Quick Start
//!
//! ```ignore
//! use gameobj_core::{EntitySeed, GameObjConfig, GameObjs};
//! use std::time::Duration;
//!
//! let objs = GameObjs::new(GameObjConfig::new())?;
//!
//! objs.new_npc(EntitySeed::new(5, "goblin", "a snarling goblin"), None);
//! let goblin = objs.find("goblin").unwrap();
//!
//! // Leaving the room
//! objs.clear_npcs();
//! objs.prune(Duration::from_secs(600), true);
//! ```

pub mod arena;
pub mod classify;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod entity;
pub mod index;
pub mod lookup;
pub mod registry;
pub mod store;
pub mod testing;

// Primary public API
pub use classify::{ClassTables, ClassifyError, Classifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Backing, ConfigError, GameObjConfig};
pub use diagnostics::{AgeHistogram, IndexStats, PruneReport};
pub use entity::{Entity, EntityHandle, EntitySeed};
pub use index::{IdentityIndex, LruIndex, TtlIndex};
pub use lookup::{LookupError, Query};
pub use registry::{Hand, RegistryKind};
pub use store::GameObjs;
pub use testing::TestHarness;
