//! Slab-backed entity storage.
//!
//! The identity index and every registry hold [`EntityHandle`]s rather than
//! entities. Each holder owns one reference; a slot is freed when its last
//! reference is released. Mutations made through the arena (decoration
//! backfill) are therefore visible to every holder.

use crate::entity::{Entity, EntityHandle, EntitySeed};
use slab::Slab;

#[derive(Debug)]
struct Slot {
    refs: u32,
    entity: Entity,
}

/// Owner of every resident entity.
#[derive(Debug, Default)]
pub struct EntityArena {
    slots: Slab<Slot>,
    next_generation: u64,
}

impl EntityArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new entity. The slot starts with one reference, owned by
    /// the caller.
    pub fn insert(&mut self, seed: EntitySeed) -> &Entity {
        let generation = self.next_generation;
        self.next_generation += 1;

        let entry = self.slots.vacant_entry();
        let handle = EntityHandle::new(entry.key(), generation);
        let slot = entry.insert(Slot {
            refs: 1,
            entity: Entity::from_seed(handle, seed),
        });
        &slot.entity
    }

    /// Resolve a handle.
    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.slots
            .get(handle.slot())
            .filter(|slot| slot.entity.handle == handle)
            .map(|slot| &slot.entity)
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.slots
            .get_mut(handle.slot())
            .filter(|slot| slot.entity.handle == handle)
            .map(|slot| &mut slot.entity)
    }

    /// Whether the handle still names a resident entity.
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Add a reference to a resident entity.
    pub fn retain(&mut self, handle: EntityHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.refs += 1;
        }
    }

    /// Drop a reference. Returns true when this freed the slot.
    pub fn release(&mut self, handle: EntityHandle) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs > 0 {
            return false;
        }
        self.slots.remove(handle.slot());
        true
    }

    /// Current reference count, zero for unknown handles.
    pub fn ref_count(&self, handle: EntityHandle) -> u32 {
        self.slots
            .get(handle.slot())
            .filter(|slot| slot.entity.handle == handle)
            .map_or(0, |slot| slot.refs)
    }

    /// Number of resident entities.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Heap and inline bytes held by resident entities.
    pub fn estimated_bytes(&self) -> usize {
        self.slots
            .iter()
            .map(|(_, slot)| std::mem::size_of::<Slot>() + slot.entity.heap_size())
            .sum()
    }

    /// Drop every entity regardless of outstanding references.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn slot_mut(&mut self, handle: EntityHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.slot())
            .filter(|slot| slot.entity.handle == handle)
    }
}
