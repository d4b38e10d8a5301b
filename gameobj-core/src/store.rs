//! GameObjs - the per-session entity service.
//!
//! One instance per game session. The protocol parser calls the `new_*`
//! factories as entities are revealed; scripts read through accessors and
//! [`GameObjs::find`]. Arena, index and registries share one lock, so a
//! prune's live snapshot can never miss a concurrent registry push.

use crate::arena::EntityArena;
use crate::classify::Classifier;
use crate::clock::{Clock, SystemClock};
use crate::config::{Backing, ConfigError, GameObjConfig};
use crate::diagnostics::{collect_stats, estimate_memory, IndexStats, PruneReport};
use crate::entity::{identity_key, normalize_noun, Entity, EntityHandle, EntitySeed};
use crate::index::{IdentityIndex, LruIndex, TtlIndex};
use crate::lookup::{resolve, LookupError, Query};
use crate::registry::{Hand, Registries, RegistryKind, StatusMap};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything guarded by the session lock.
struct State {
    arena: EntityArena,
    index: Box<dyn IdentityIndex>,
    registries: Registries,
}

impl State {
    fn new(backing: Backing) -> Self {
        let index: Box<dyn IdentityIndex> = match backing {
            Backing::Ttl => Box::new(TtlIndex::new()),
            Backing::Lru { capacity } => Box::new(LruIndex::new(capacity)),
        };
        Self {
            arena: EntityArena::new(),
            index,
            registries: Registries::default(),
        }
    }

    fn snapshot(&self, handle: EntityHandle) -> Option<Entity> {
        self.arena.get(handle).cloned()
    }

    fn snapshot_all(&self, handles: &[EntityHandle]) -> Vec<Entity> {
        handles
            .iter()
            .filter_map(|h| self.arena.get(*h))
            .cloned()
            .collect()
    }
}

/// Entity cache and registries for one game session.
pub struct GameObjs {
    state: Mutex<State>,
    classifier: Mutex<Classifier>,
    clock: Arc<dyn Clock>,
    config: GameObjConfig,
}

impl std::fmt::Debug for GameObjs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObjs")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Default for GameObjs {
    fn default() -> Self {
        Self::build(GameObjConfig::default(), Arc::new(SystemClock))
    }
}

impl GameObjs {
    /// Create a session using the system clock.
    pub fn new(config: GameObjConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a session with a custom time source.
    pub fn with_clock(config: GameObjConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    pub(crate) fn build(config: GameObjConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::new(config.backing)),
            classifier: Mutex::new(Classifier::new(config.data_file.clone())),
            clock,
            config,
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &GameObjConfig {
        &self.config
    }

    // =========================================================================
    // Factories
    // =========================================================================

    /// Get or create an entity and add it to a flat registry.
    pub fn register(&self, kind: RegistryKind, seed: EntitySeed) -> Entity {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let State {
            arena,
            index,
            registries,
        } = &mut *guard;

        let entity = index.get_or_create(arena, seed, now);
        registries.push(kind, &entity, arena);
        entity
    }

    /// Record an NPC and overwrite its status.
    pub fn new_npc(&self, seed: EntitySeed, status: Option<&str>) -> Entity {
        self.register_with_status(RegistryKind::Npcs, StatusMap::Npc, seed, status)
    }

    /// Record a player character and overwrite its status.
    pub fn new_pc(&self, seed: EntitySeed, status: Option<&str>) -> Entity {
        self.register_with_status(RegistryKind::Pcs, StatusMap::Pc, seed, status)
    }

    fn register_with_status(
        &self,
        kind: RegistryKind,
        map: StatusMap,
        seed: EntitySeed,
        status: Option<&str>,
    ) -> Entity {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let State {
            arena,
            index,
            registries,
        } = &mut *guard;

        let entity = index.get_or_create(arena, seed, now);
        registries.push(kind, &entity, arena);
        registries.set_status(map, &entity.id, status);
        entity
    }

    pub fn new_loot(&self, seed: EntitySeed) -> Entity {
        self.register(RegistryKind::Loot, seed)
    }

    /// Record an inventory item, or a container's content when `container`
    /// is given.
    pub fn new_inv(&self, seed: EntitySeed, container: Option<&str>) -> Entity {
        let Some(container) = container else {
            return self.register(RegistryKind::Inventory, seed);
        };

        let now = self.clock.now();
        let mut guard = self.state.lock();
        let State {
            arena,
            index,
            registries,
        } = &mut *guard;

        let entity = index.get_or_create(arena, seed, now);
        registries.push_contents(container, &entity, arena);
        entity
    }

    pub fn new_room_desc(&self, seed: EntitySeed) -> Entity {
        self.register(RegistryKind::RoomDesc, seed)
    }

    pub fn new_fam_loot(&self, seed: EntitySeed) -> Entity {
        self.register(RegistryKind::FamLoot, seed)
    }

    pub fn new_fam_npc(&self, seed: EntitySeed) -> Entity {
        self.register(RegistryKind::FamNpcs, seed)
    }

    pub fn new_fam_pc(&self, seed: EntitySeed) -> Entity {
        self.register(RegistryKind::FamPcs, seed)
    }

    pub fn new_fam_room_desc(&self, seed: EntitySeed) -> Entity {
        self.register(RegistryKind::FamRoomDesc, seed)
    }

    /// Put an entity in a hand, replacing whatever was there.
    pub fn set_hand(&self, hand: Hand, seed: EntitySeed) -> Entity {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let State {
            arena,
            index,
            registries,
        } = &mut *guard;

        let entity = index.get_or_create(arena, seed, now);
        registries.set_hand(hand, Some(&entity), arena);
        entity
    }

    pub fn set_left_hand(&self, seed: EntitySeed) -> Entity {
        self.set_hand(Hand::Left, seed)
    }

    pub fn set_right_hand(&self, seed: EntitySeed) -> Entity {
        self.set_hand(Hand::Right, seed)
    }

    // =========================================================================
    // Clearing
    // =========================================================================

    /// Empty a flat registry. Index entries are untouched.
    pub fn clear(&self, kind: RegistryKind) {
        let mut guard = self.state.lock();
        let State {
            arena, registries, ..
        } = &mut *guard;
        registries.clear(kind, arena);
    }

    /// Empty the NPC list and NPC statuses.
    pub fn clear_npcs(&self) {
        self.clear(RegistryKind::Npcs);
    }

    /// Empty the PC list and PC statuses.
    pub fn clear_pcs(&self) {
        self.clear(RegistryKind::Pcs);
    }

    pub fn clear_loot(&self) {
        self.clear(RegistryKind::Loot);
    }

    pub fn clear_inv(&self) {
        self.clear(RegistryKind::Inventory);
    }

    pub fn clear_room_desc(&self) {
        self.clear(RegistryKind::RoomDesc);
    }

    pub fn clear_fam_loot(&self) {
        self.clear(RegistryKind::FamLoot);
    }

    pub fn clear_fam_npcs(&self) {
        self.clear(RegistryKind::FamNpcs);
    }

    pub fn clear_fam_pcs(&self) {
        self.clear(RegistryKind::FamPcs);
    }

    pub fn clear_fam_room_desc(&self) {
        self.clear(RegistryKind::FamRoomDesc);
    }

    /// Empty a hand.
    pub fn clear_hand(&self, hand: Hand) {
        let mut guard = self.state.lock();
        let State {
            arena, registries, ..
        } = &mut *guard;
        registries.set_hand(hand, None, arena);
    }

    pub fn clear_left_hand(&self) {
        self.clear_hand(Hand::Left);
    }

    pub fn clear_right_hand(&self) {
        self.clear_hand(Hand::Right);
    }

    /// Forget every container.
    pub fn clear_all_containers(&self) {
        let mut guard = self.state.lock();
        let State {
            arena, registries, ..
        } = &mut *guard;
        registries.clear_all_containers(arena);
    }

    /// Empty one container, keeping it known.
    pub fn clear_container(&self, container: &str) {
        let mut guard = self.state.lock();
        let State {
            arena, registries, ..
        } = &mut *guard;
        registries.clear_container(container, arena);
    }

    /// Remove one container. Returns false if it was unknown.
    pub fn delete_container(&self, container: &str) -> bool {
        let mut guard = self.state.lock();
        let State {
            arena, registries, ..
        } = &mut *guard;
        registries.delete_container(container, arena)
    }

    /// Drop every registry and every index entry.
    pub fn reset(&self) {
        let mut guard = self.state.lock();
        let State {
            arena,
            index,
            registries,
        } = &mut *guard;
        registries.clear_everything(arena);
        index.clear(arena);
        arena.clear();
        tracing::debug!("session entities reset");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Copy of a flat registry, `None` when it is empty.
    pub fn registry(&self, kind: RegistryKind) -> Option<Vec<Entity>> {
        let state = self.state.lock();
        let list = state.registries.list(kind);
        if list.is_empty() {
            return None;
        }
        Some(state.snapshot_all(list))
    }

    pub fn npcs(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::Npcs)
    }

    pub fn pcs(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::Pcs)
    }

    pub fn loot(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::Loot)
    }

    pub fn inv(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::Inventory)
    }

    pub fn room_desc(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::RoomDesc)
    }

    pub fn fam_loot(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::FamLoot)
    }

    pub fn fam_npcs(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::FamNpcs)
    }

    pub fn fam_pcs(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::FamPcs)
    }

    pub fn fam_room_desc(&self) -> Option<Vec<Entity>> {
        self.registry(RegistryKind::FamRoomDesc)
    }

    /// Current occupant of a hand.
    pub fn hand(&self, hand: Hand) -> Option<Entity> {
        let state = self.state.lock();
        state.registries.hand(hand).and_then(|h| state.snapshot(h))
    }

    pub fn left_hand(&self) -> Option<Entity> {
        self.hand(Hand::Left)
    }

    pub fn right_hand(&self) -> Option<Entity> {
        self.hand(Hand::Right)
    }

    /// Copy of every container's contents, in the order containers appeared.
    pub fn containers(&self) -> IndexMap<String, Vec<Entity>> {
        let state = self.state.lock();
        state
            .registries
            .containers()
            .iter()
            .map(|(id, handles)| (id.clone(), state.snapshot_all(handles)))
            .collect()
    }

    /// Copy of one container's contents, `None` if the container is unknown.
    pub fn contents(&self, container: &str) -> Option<Vec<Entity>> {
        let state = self.state.lock();
        state
            .registries
            .contents(container)
            .map(|handles| state.snapshot_all(handles))
    }

    /// Contents of the container whose id is this entity's id.
    pub fn contents_of(&self, entity: &Entity) -> Option<Vec<Entity>> {
        self.contents(&entity.id)
    }

    /// Current state of an entity, if it is still resident.
    pub fn refresh(&self, entity: &Entity) -> Option<Entity> {
        self.state.lock().snapshot(entity.handle)
    }

    /// Look up an index entry by its triple without refreshing it.
    pub fn lookup(&self, id: &str, noun: Option<&str>, name: Option<&str>) -> Option<Entity> {
        let noun = normalize_noun(noun.map(str::to_string), name);
        let key = identity_key(id, noun.as_deref(), name);
        let mut state = self.state.lock();
        let handle = state.index.get(&key)?;
        state.snapshot(handle)
    }

    /// Number of index entries.
    pub fn index_len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Number of resident entities, including ones only registries hold.
    pub fn resident_len(&self) -> usize {
        self.state.lock().arena.len()
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Status of an entity.
    ///
    /// NPCs and PCs report their recorded status. Objects still held by a
    /// registry report `None`; anything else reports `"gone"`.
    pub fn status_of(&self, entity: &Entity) -> Option<String> {
        let state = self.state.lock();
        if let Some(status) = state.registries.status(&entity.id) {
            return status.map(str::to_string);
        }
        if state.registries.holds_object(&entity.id, &state.arena) {
            None
        } else {
            Some("gone".to_string())
        }
    }

    /// Overwrite the status of an NPC or PC. Returns false when the id has
    /// no status entry.
    pub fn set_status(&self, entity: &Entity, status: Option<&str>) -> bool {
        let mut state = self.state.lock();
        match state.registries.status_map_of(&entity.id) {
            Some(map) => {
                state.registries.set_status(map, &entity.id, status);
                true
            }
            None => false,
        }
    }

    /// NPCs whose status marks them dead or gone.
    pub fn dead(&self) -> Vec<Entity> {
        self.npcs_with_status()
            .into_iter()
            .filter(|(_, status)| is_dead(status.as_deref()))
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Living NPCs classified as aggressive and not as companions.
    pub fn targets(&self) -> Vec<Entity> {
        let npcs = self.npcs_with_status();
        let mut classifier = self.classifier.lock();
        npcs.into_iter()
            .filter(|(_, status)| !is_dead(status.as_deref()))
            .filter(|(entity, _)| {
                classifier
                    .type_of(entity.name.as_deref(), entity.noun.as_deref())
                    .is_some_and(|t| {
                        t.contains("aggressive") && !t.contains("companion") && !t.contains("familiar")
                    })
            })
            .map(|(entity, _)| entity)
            .collect()
    }

    fn npcs_with_status(&self) -> Vec<(Entity, Option<String>)> {
        let state = self.state.lock();
        state
            .registries
            .list(RegistryKind::Npcs)
            .iter()
            .filter_map(|h| state.arena.get(*h))
            .map(|entity| {
                let status = state
                    .registries
                    .status(&entity.id)
                    .flatten()
                    .map(str::to_string);
                (entity.clone(), status)
            })
            .collect()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Resolve an id, noun, name or pattern to one entity.
    ///
    /// Registries are searched in a fixed order: inventory, loot, npcs, pcs,
    /// right hand, left hand, room descriptions, container contents.
    pub fn find(&self, query: impl Into<Query>) -> Option<Entity> {
        let query = query.into();
        let state = self.state.lock();
        let candidates: Vec<&Entity> = state
            .registries
            .search_order()
            .filter_map(|h| state.arena.get(h))
            .collect();
        resolve(&candidates, &query).cloned()
    }

    /// Resolve a query that arrived as JSON from a script bridge.
    ///
    /// Shapes other than strings and integers are logged and match nothing.
    pub fn find_value(&self, value: &Value) -> Option<Entity> {
        match Query::try_from(value) {
            Ok(query) => self.find(query),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    /// Like [`GameObjs::find_value`], but surfaces the rejection.
    pub fn try_find_value(&self, value: &Value) -> Result<Option<Entity>, LookupError> {
        Ok(self.find(Query::try_from(value)?))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Evict index entries that no registry holds and that have been idle
    /// longer than `ttl`.
    pub fn prune(&self, ttl: Duration, verbose: bool) -> PruneReport {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let State {
            arena,
            index,
            registries,
        } = &mut *guard;

        let live = registries.live_ids(arena);
        let memory_before = estimate_memory(index.as_ref(), arena);
        let counts = index.prune(arena, &live, ttl, now);
        let memory_after = estimate_memory(index.as_ref(), arena);

        let report = PruneReport::new(index.backing(), ttl, counts, memory_before, memory_after);
        if verbose {
            tracing::info!("{}", report);
        } else {
            tracing::debug!(removed = report.removed, remaining = report.remaining, "pruned index");
        }
        report
    }

    /// Prune with the configured default TTL.
    pub fn prune_default(&self) -> PruneReport {
        self.prune(self.config.default_ttl(), false)
    }

    /// Describe index size and staleness relative to `ttl`.
    pub fn stats(&self, ttl: Duration, verbose: bool) -> IndexStats {
        let now = self.clock.now();
        let state = self.state.lock();
        let live = state.registries.live_ids(&state.arena);
        let stats = collect_stats(state.index.as_ref(), &state.arena, &live, ttl, now);
        if verbose {
            tracing::info!("{}", stats);
        }
        stats
    }

    /// Stats against the configured default TTL.
    pub fn stats_default(&self) -> IndexStats {
        self.stats(self.config.default_ttl(), false)
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Reload classification data, from `path` if given.
    pub fn reload(&self, path: Option<&Path>) -> bool {
        self.classifier.lock().reload(path)
    }

    /// Comma-joined type tags for an entity.
    pub fn type_of(&self, entity: &Entity) -> Option<String> {
        self.classifier
            .lock()
            .type_of(entity.name.as_deref(), entity.noun.as_deref())
    }

    /// Comma-joined sellable tags for an entity.
    pub fn sellable_of(&self, entity: &Entity) -> Option<String> {
        self.classifier
            .lock()
            .sellable_of(entity.name.as_deref(), entity.noun.as_deref())
    }

    /// Whether `tag` is one of the entity's type tags.
    pub fn is_type(&self, entity: &Entity, tag: &str) -> bool {
        self.type_of(entity)
            .is_some_and(|types| types.split(',').any(|t| t == tag))
    }
}

fn is_dead(status: Option<&str>) -> bool {
    status.is_some_and(|s| s.contains("dead") || s.contains("gone"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(id: u32, noun: &str, name: &str) -> EntitySeed {
        EntitySeed::new(id, noun, name)
    }

    #[test]
    fn test_empty_registry_is_none() {
        let objs = GameObjs::default();
        assert!(objs.npcs().is_none());
        assert!(objs.inv().is_none());
        assert!(objs.right_hand().is_none());
        assert!(objs.containers().is_empty());

        objs.new_npc(seed(1, "orc", "an orc"), None);
        assert_eq!(objs.npcs().map(|v| v.len()), Some(1));

        objs.clear_npcs();
        assert!(objs.npcs().is_none());
    }

    #[test]
    fn test_accessors_return_copies() {
        let objs = GameObjs::default();
        objs.new_loot(seed(1, "coin", "a coin"));

        let mut copy = objs.loot().unwrap();
        copy.clear();
        assert_eq!(objs.loot().map(|v| v.len()), Some(1));
    }

    #[test]
    fn test_status_overwritten_unconditionally() {
        let objs = GameObjs::default();
        let orc = objs.new_npc(seed(1, "orc", "an orc"), Some("sitting"));
        assert_eq!(objs.status_of(&orc).as_deref(), Some("sitting"));

        objs.new_npc(seed(1, "orc", "an orc"), None);
        assert_eq!(objs.status_of(&orc), None);

        objs.new_npc(seed(1, "orc", "an orc"), Some("dead"));
        assert_eq!(objs.dead().len(), 1);
    }

    #[test]
    fn test_status_of_objects_and_gone() {
        let objs = GameObjs::default();
        let coin = objs.new_loot(seed(1, "coin", "a coin"));
        assert_eq!(objs.status_of(&coin), None);

        objs.clear_loot();
        assert_eq!(objs.status_of(&coin).as_deref(), Some("gone"));
    }

    #[test]
    fn test_set_status() {
        let objs = GameObjs::default();
        let elf = objs.new_pc(seed(7, "Aelis", "Aelis"), None);
        let coin = objs.new_loot(seed(1, "coin", "a coin"));

        assert!(objs.set_status(&elf, Some("kneeling")));
        assert_eq!(objs.status_of(&elf).as_deref(), Some("kneeling"));
        assert!(!objs.set_status(&coin, Some("shiny")));
    }

    #[test]
    fn test_inventory_routes_into_container() {
        let objs = GameObjs::default();
        let pack = objs.new_inv(seed(100, "backpack", "a leather backpack"), None);
        let gem = objs.new_inv(seed(101, "gem", "a red gem"), Some("100"));

        assert_eq!(objs.inv().map(|v| v.len()), Some(1));
        let contents = objs.contents_of(&pack).unwrap();
        assert_eq!(contents.len(), 1);
        assert!(contents[0].same_as(&gem));
        assert!(objs.contents("999").is_none());
    }

    #[test]
    fn test_optional_parser_decorations() {
        let objs = GameObjs::default();
        let bare = objs.new_room_desc(seed(4, "fountain", "a marble fountain").with_decorations(None, None));
        assert!(bare.before_name.is_none());

        let lit = objs.new_room_desc(
            seed(4, "fountain", "a marble fountain").with_decorations(Some("moonlit"), None),
        );
        assert!(lit.same_as(&bare));
        assert_eq!(lit.full_name(), "moonlit a marble fountain");
    }

    #[test]
    fn test_lookup_by_triple() {
        let objs = GameObjs::default();
        let gem = objs.new_loot(seed(3, "lapis lazuli", "a blue lapis lazuli"));
        assert_eq!(gem.noun.as_deref(), Some("lapis"));

        let found = objs
            .lookup("3", Some("lapis lazuli"), Some("a blue lapis lazuli"))
            .unwrap();
        assert!(found.same_as(&gem));
        assert!(objs.lookup("3", Some("lapis"), Some("a red gem")).is_none());
    }

    #[test]
    fn test_reset_drops_everything() {
        let objs = GameObjs::default();
        objs.new_npc(seed(1, "orc", "an orc"), None);
        objs.set_left_hand(seed(2, "dagger", "a dagger"));
        objs.new_inv(seed(3, "gem", "a gem"), Some("9"));

        objs.reset();
        assert!(objs.npcs().is_none());
        assert!(objs.left_hand().is_none());
        assert!(objs.containers().is_empty());
        assert_eq!(objs.index_len(), 0);
        assert_eq!(objs.resident_len(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = GameObjs::new(GameObjConfig::new().with_lru(0)).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity));
    }
}
