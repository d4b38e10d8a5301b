//! Per-category views over arena entities.
//!
//! Registries hold handles, one arena reference each. Clearing a registry
//! releases its references but leaves index entries alone.

use crate::arena::EntityArena;
use crate::entity::{Entity, EntityHandle};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The flat, list-backed registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Npcs,
    Pcs,
    Loot,
    Inventory,
    RoomDesc,
    FamLoot,
    FamNpcs,
    FamPcs,
    FamRoomDesc,
}

impl RegistryKind {
    /// Every flat registry.
    pub const ALL: [RegistryKind; 9] = [
        RegistryKind::Npcs,
        RegistryKind::Pcs,
        RegistryKind::Loot,
        RegistryKind::Inventory,
        RegistryKind::RoomDesc,
        RegistryKind::FamLoot,
        RegistryKind::FamNpcs,
        RegistryKind::FamPcs,
        RegistryKind::FamRoomDesc,
    ];

    /// Get the display name for this registry.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryKind::Npcs => "npcs",
            RegistryKind::Pcs => "pcs",
            RegistryKind::Loot => "loot",
            RegistryKind::Inventory => "inv",
            RegistryKind::RoomDesc => "room_desc",
            RegistryKind::FamLoot => "fam_loot",
            RegistryKind::FamNpcs => "fam_npcs",
            RegistryKind::FamPcs => "fam_pcs",
            RegistryKind::FamRoomDesc => "fam_room_desc",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Which hand slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    Right,
}

/// Which status side-map an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusMap {
    Npc,
    Pc,
}

/// All registries for one session.
#[derive(Debug, Default)]
pub(crate) struct Registries {
    lists: [Vec<EntityHandle>; 9],
    left_hand: Option<EntityHandle>,
    right_hand: Option<EntityHandle>,
    containers: IndexMap<String, Vec<EntityHandle>>,
    npc_status: HashMap<String, Option<String>>,
    pc_status: HashMap<String, Option<String>>,
}

impl Registries {
    pub(crate) fn list(&self, kind: RegistryKind) -> &[EntityHandle] {
        &self.lists[kind.slot()]
    }

    /// Add to a flat registry unless an entity with the same key is there.
    pub(crate) fn push(&mut self, kind: RegistryKind, entity: &Entity, arena: &mut EntityArena) {
        push_unique(&mut self.lists[kind.slot()], entity, arena);
    }

    /// Add to a container's contents, creating the container on demand.
    pub(crate) fn push_contents(
        &mut self,
        container: &str,
        entity: &Entity,
        arena: &mut EntityArena,
    ) {
        let contents = self.containers.entry(container.to_string()).or_default();
        push_unique(contents, entity, arena);
    }

    pub(crate) fn clear(&mut self, kind: RegistryKind, arena: &mut EntityArena) {
        release_all(&mut self.lists[kind.slot()], arena);
        match kind {
            RegistryKind::Npcs => self.npc_status.clear(),
            RegistryKind::Pcs => self.pc_status.clear(),
            _ => {}
        }
    }

    pub(crate) fn hand(&self, hand: Hand) -> Option<EntityHandle> {
        match hand {
            Hand::Left => self.left_hand,
            Hand::Right => self.right_hand,
        }
    }

    /// Replace a hand's occupant.
    pub(crate) fn set_hand(&mut self, hand: Hand, entity: Option<&Entity>, arena: &mut EntityArena) {
        let incoming = entity.map(|e| e.handle);
        if let Some(handle) = incoming {
            arena.retain(handle);
        }
        let slot = match hand {
            Hand::Left => &mut self.left_hand,
            Hand::Right => &mut self.right_hand,
        };
        if let Some(old) = std::mem::replace(slot, incoming) {
            arena.release(old);
        }
    }

    pub(crate) fn containers(&self) -> &IndexMap<String, Vec<EntityHandle>> {
        &self.containers
    }

    pub(crate) fn contents(&self, container: &str) -> Option<&[EntityHandle]> {
        self.containers.get(container).map(Vec::as_slice)
    }

    pub(crate) fn clear_all_containers(&mut self, arena: &mut EntityArena) {
        for (_, mut contents) in self.containers.drain(..) {
            release_all(&mut contents, arena);
        }
    }

    /// Empty a container but keep it known.
    pub(crate) fn clear_container(&mut self, container: &str, arena: &mut EntityArena) {
        let contents = self.containers.entry(container.to_string()).or_default();
        release_all(contents, arena);
    }

    /// Forget a container entirely.
    pub(crate) fn delete_container(&mut self, container: &str, arena: &mut EntityArena) -> bool {
        match self.containers.shift_remove(container) {
            Some(mut contents) => {
                release_all(&mut contents, arena);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_status(&mut self, map: StatusMap, id: &str, status: Option<&str>) {
        let statuses = match map {
            StatusMap::Npc => &mut self.npc_status,
            StatusMap::Pc => &mut self.pc_status,
        };
        statuses.insert(id.to_string(), status.map(str::to_string));
    }

    /// Status recorded for an id, outer `None` when the id has no entry.
    pub(crate) fn status(&self, id: &str) -> Option<Option<&str>> {
        self.npc_status
            .get(id)
            .or_else(|| self.pc_status.get(id))
            .map(|s| s.as_deref())
    }

    /// Which status map already tracks an id.
    pub(crate) fn status_map_of(&self, id: &str) -> Option<StatusMap> {
        if self.npc_status.contains_key(id) {
            Some(StatusMap::Npc)
        } else if self.pc_status.contains_key(id) {
            Some(StatusMap::Pc)
        } else {
            None
        }
    }

    /// Handles in lookup priority order: inventory, loot, npcs, pcs, right
    /// hand, left hand, room descriptions, then every container's contents.
    pub(crate) fn search_order(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        let head = [
            RegistryKind::Inventory,
            RegistryKind::Loot,
            RegistryKind::Npcs,
            RegistryKind::Pcs,
        ]
        .into_iter()
        .flat_map(|kind| self.list(kind).iter().copied());

        head.chain(self.right_hand)
            .chain(self.left_hand)
            .chain(self.list(RegistryKind::RoomDesc).iter().copied())
            .chain(self.containers.values().flatten().copied())
    }

    /// Every handle any registry, hand or container holds.
    pub(crate) fn all_handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.lists
            .iter()
            .flatten()
            .copied()
            .chain(self.left_hand)
            .chain(self.right_hand)
            .chain(self.containers.values().flatten().copied())
    }

    /// Ids of every entity currently held anywhere.
    pub(crate) fn live_ids(&self, arena: &EntityArena) -> HashSet<String> {
        self.all_handles()
            .filter_map(|handle| arena.get(handle))
            .map(|entity| entity.id.clone())
            .collect()
    }

    /// Whether an id is held by a non-status registry (items, hands,
    /// containers, rooms, familiar views).
    pub(crate) fn holds_object(&self, id: &str, arena: &EntityArena) -> bool {
        let listed = RegistryKind::ALL
            .into_iter()
            .filter(|kind| !matches!(kind, RegistryKind::Npcs | RegistryKind::Pcs))
            .flat_map(|kind| self.list(kind).iter().copied());

        listed
            .chain(self.left_hand)
            .chain(self.right_hand)
            .chain(self.containers.values().flatten().copied())
            .filter_map(|handle| arena.get(handle))
            .any(|entity| entity.id == id)
    }

    /// Drop everything, releasing each reference.
    pub(crate) fn clear_everything(&mut self, arena: &mut EntityArena) {
        for kind in RegistryKind::ALL {
            self.clear(kind, arena);
        }
        self.set_hand(Hand::Left, None, arena);
        self.set_hand(Hand::Right, None, arena);
        self.clear_all_containers(arena);
    }
}

/// Push a handle, or swap it in for a stale allocation with the same key.
fn push_unique(list: &mut Vec<EntityHandle>, entity: &Entity, arena: &mut EntityArena) {
    if list.contains(&entity.handle) {
        return;
    }
    let existing = list
        .iter()
        .position(|h| arena.get(*h).is_some_and(|held| held.same_key(entity)));

    arena.retain(entity.handle);
    match existing {
        Some(pos) => {
            let old = std::mem::replace(&mut list[pos], entity.handle);
            arena.release(old);
        }
        None => list.push(entity.handle),
    }
}

fn release_all(list: &mut Vec<EntityHandle>, arena: &mut EntityArena) {
    for handle in list.drain(..) {
        arena.release(handle);
    }
}
