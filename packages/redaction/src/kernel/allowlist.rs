// Allowlist Implementations
//
// Terms exempted from redaction: public hotline numbers, the operator's own
// support email, product names a recognizer keeps mistaking for a person.

use std::collections::{HashMap, HashSet};

use crate::common::types::EntityType;
use crate::kernel::traits::BaseAllowlist;

/// Fixed allowlist built once at startup.
///
/// Matching is exact on the span text after trimming; entries can be scoped
/// to one entity type or apply globally.
#[derive(Debug, Default)]
pub struct StaticAllowlist {
    global: HashSet<String>,
    per_type: HashMap<EntityType, HashSet<String>>,
}

impl StaticAllowlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_global(&mut self, text: impl Into<String>) {
        self.global.insert(text.into());
    }

    pub fn insert(&mut self, entity_type: EntityType, text: impl Into<String>) {
        self.per_type.entry(entity_type).or_default().insert(text.into());
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.per_type.values().map(HashSet::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_type.is_empty()
    }
}

impl BaseAllowlist for StaticAllowlist {
    fn is_exempt(&self, entity_type: &EntityType, text: &str) -> bool {
        let text = text.trim();
        if self.global.contains(text) {
            return true;
        }
        self.per_type
            .get(entity_type)
            .map(|entries| entries.contains(text))
            .unwrap_or(false)
    }
}

/// Allowlist that exempts nothing.
#[derive(Debug, Default)]
pub struct NoopAllowlist;

impl NoopAllowlist {
    pub fn new() -> Self {
        Self
    }
}

impl BaseAllowlist for NoopAllowlist {
    fn is_exempt(&self, _entity_type: &EntityType, _text: &str) -> bool {
        false
    }
}
