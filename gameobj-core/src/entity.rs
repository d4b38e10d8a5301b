//! Entity value type and composite identity keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an entity slot in the arena.
///
/// The generation distinguishes a slot reused after eviction from the
/// entity that previously lived there, so two handles compare equal only
/// when they name the same allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle {
    slot: usize,
    generation: u64,
}

impl EntityHandle {
    pub(crate) fn new(slot: usize, generation: u64) -> Self {
        Self { slot, generation }
    }

    /// Arena slot index.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Allocation generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The observed fields of an entity, as reported by the protocol parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySeed {
    pub id: String,
    pub noun: Option<String>,
    pub name: Option<String>,
    pub before_name: Option<String>,
    pub after_name: Option<String>,
}

impl EntitySeed {
    /// Create a seed from an id, noun and name.
    ///
    /// Ids are stored as strings whatever type the caller passes.
    pub fn new(id: impl ToString, noun: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            noun: Some(noun.into()),
            name: Some(name.into()),
            before_name: None,
            after_name: None,
        }
    }

    /// Set the text shown before the name.
    pub fn with_before_name(mut self, before: impl Into<String>) -> Self {
        self.before_name = Some(before.into());
        self
    }

    /// Set the text shown after the name.
    pub fn with_after_name(mut self, after: impl Into<String>) -> Self {
        self.after_name = Some(after.into());
        self
    }

    /// Set both decorations from optional parser fields.
    pub fn with_decorations(mut self, before: Option<&str>, after: Option<&str>) -> Self {
        self.before_name = before.map(str::to_string);
        self.after_name = after.map(str::to_string);
        self
    }

    /// Apply irregular noun rewrites.
    pub fn normalized(mut self) -> Self {
        self.noun = normalize_noun(self.noun.take(), self.name.as_deref());
        self
    }

    /// The composite identity key for this seed.
    pub fn key(&self) -> String {
        identity_key(&self.id, self.noun.as_deref(), self.name.as_deref())
    }
}

/// Build the composite identity key `id|noun|name`.
pub fn identity_key(id: &str, noun: Option<&str>, name: Option<&str>) -> String {
    format!("{}|{}|{}", id, noun.unwrap_or(""), name.unwrap_or(""))
}

/// Collapse multi-word game nouns to the token scripts actually type.
pub fn normalize_noun(noun: Option<String>, name: Option<&str>) -> Option<String> {
    let noun = noun?;
    let rewritten = match noun.as_str() {
        "lapis lazuli" => "lapis",
        "Hammer of Kai" => "hammer",
        "ball and chain" => "ball",
        "pearl" if name.is_some_and(|n| n.contains("mother-of-pearl")) => "mother-of-pearl",
        _ => return Some(noun),
    };
    Some(rewritten.to_string())
}

/// A game entity: anything the session has revealed with an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Arena handle; equal handles mean the same entity.
    pub handle: EntityHandle,
    /// Stable external identifier.
    pub id: String,
    /// Single-token handle scripts use to refer to the entity.
    pub noun: Option<String>,
    /// Full descriptive name.
    pub name: Option<String>,
    /// Decoration shown before the name.
    pub before_name: Option<String>,
    /// Decoration shown after the name.
    pub after_name: Option<String>,
}

impl Entity {
    pub(crate) fn from_seed(handle: EntityHandle, seed: EntitySeed) -> Self {
        Self {
            handle,
            id: seed.id,
            noun: seed.noun,
            name: seed.name,
            before_name: seed.before_name,
            after_name: seed.after_name,
        }
    }

    /// The composite identity key.
    pub fn key(&self) -> String {
        identity_key(&self.id, self.noun.as_deref(), self.name.as_deref())
    }

    /// Whether both entities carry the same identity key.
    pub fn same_key(&self, other: &Entity) -> bool {
        self.id == other.id && self.noun == other.noun && self.name == other.name
    }

    /// Whether both values refer to the same allocation.
    pub fn same_as(&self, other: &Entity) -> bool {
        self.handle == other.handle
    }

    /// Noun, or the empty string.
    pub fn noun_str(&self) -> &str {
        self.noun.as_deref().unwrap_or("")
    }

    /// Name, or the empty string.
    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Name with its decorations, separated by single spaces.
    pub fn full_name(&self) -> String {
        [
            self.before_name.as_deref(),
            self.name.as_deref(),
            self.after_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Fill decorations that are still unset. Set values are never replaced.
    pub(crate) fn backfill(&mut self, before: Option<String>, after: Option<String>) {
        if self.before_name.is_none() {
            self.before_name = before;
        }
        if self.after_name.is_none() {
            self.after_name = after;
        }
    }

    /// Bytes held on the heap by this entity's strings.
    pub fn heap_size(&self) -> usize {
        self.id.capacity()
            + [
                &self.noun,
                &self.name,
                &self.before_name,
                &self.after_name,
            ]
            .into_iter()
            .flatten()
            .map(String::capacity)
            .sum::<usize>()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun_str())
    }
}
