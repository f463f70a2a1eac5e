// Placeholder tokens and the per-session index allocator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use lazy_static::lazy_static;
use regex::Regex;

use super::types::EntityType;

lazy_static! {
    // Canonical wire form: uppercase type token, underscore, positive
    // decimal index with no leading zeros, angle-bracket delimited.
    static ref CANONICAL_TOKEN: Regex =
        Regex::new(r"^<([A-Z][A-Z0-9_]*)_([1-9][0-9]*)>$").expect("canonical token regex");
}

/// A reversible redaction token.
///
/// The rendered form `<TYPE_N>` is the wire contract: this exact string is
/// what the upstream model receives and is expected to echo back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    entity_type: EntityType,
    index: u32,
}

impl Placeholder {
    /// Indices start at 1; an index of 0 never appears on the wire.
    pub fn new(entity_type: EntityType, index: u32) -> Self {
        debug_assert!(index >= 1, "placeholder indices are 1-based");
        Self { entity_type, index }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// The canonical `<TYPE_N>` token.
    pub fn token(&self) -> String {
        format!("<{}_{}>", self.entity_type.as_str(), self.index)
    }

    /// Strict parse of the canonical wire form. Reformatted variants are
    /// handled by the fuzzy rehydrator, never here.
    pub fn parse(token: &str) -> Option<Placeholder> {
        let caps = CANONICAL_TOKEN.captures(token)?;
        let entity_type = EntityType::new(&caps[1]);
        let index: u32 = caps[2].parse().ok()?;
        Some(Placeholder { entity_type, index })
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}_{}>", self.entity_type.as_str(), self.index)
    }
}

/// Thread-safe per-type sequential counter.
///
/// State is scoped to exactly one [`super::mapping::SessionMapping`]'s
/// lifetime; counters never leak across sessions. Every mutating call is
/// serialized through the per-instance lock and holds it only for the
/// increment.
#[derive(Debug, Default)]
pub struct PlaceholderAllocator {
    counters: Mutex<HashMap<EntityType, u32>>,
}

impl PlaceholderAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next 1-based index for `entity_type`, in first-seen order.
    pub fn next_index(&self, entity_type: &EntityType) -> u32 {
        let mut counters = self.counters.lock().expect("allocator lock poisoned");
        let slot = counters.entry(entity_type.clone()).or_insert(0);
        *slot += 1;
        *slot
    }

    pub fn allocate(&self, entity_type: EntityType) -> Placeholder {
        let index = self.next_index(&entity_type);
        Placeholder::new(entity_type, index)
    }

    /// Raise the counter so `placeholder`'s index is never handed out again.
    /// Used when rebuilding a mapping from its portable form.
    pub fn observe(&self, placeholder: &Placeholder) {
        let mut counters = self.counters.lock().expect("allocator lock poisoned");
        let slot = counters.entry(placeholder.entity_type().clone()).or_insert(0);
        if placeholder.index() > *slot {
            *slot = placeholder.index();
        }
    }

    pub fn current(&self, entity_type: &EntityType) -> u32 {
        let counters = self.counters.lock().expect("allocator lock poisoned");
        counters.get(entity_type).copied().unwrap_or(0)
    }

    pub fn reset(&self) {
        let mut counters = self.counters.lock().expect("allocator lock poisoned");
        counters.clear();
    }
}

impl Clone for PlaceholderAllocator {
    fn clone(&self) -> Self {
        let counters = self
            .counters
            .lock()
            .expect("allocator lock poisoned")
            .clone();
        Self {
            counters: Mutex::new(counters),
        }
    }
}
