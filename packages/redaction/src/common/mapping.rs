// Bidirectional (type, original) <-> placeholder table, scoped to one session.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::placeholder::{Placeholder, PlaceholderAllocator};
use super::types::EntityType;

/// Errors raised while rebuilding a mapping from its portable form.
#[derive(Debug, thiserror::Error)]
pub enum MappingCodecError {
    #[error("invalid placeholder token `{0}` in portable mapping")]
    InvalidPlaceholder(String),
    #[error("placeholder `{0}` maps to more than one original value")]
    DuplicatePlaceholder(String),
}

/// Per-session redaction table.
///
/// Invariants:
/// - each placeholder maps to exactly one original value;
/// - identical (type, original) pairs always resolve to the same
///   placeholder (no duplicate allocation);
/// - indices per type are assigned 1..N in first-seen order and are never
///   reassigned to a different original.
#[derive(Debug, Clone)]
pub struct SessionMapping {
    session_id: String,
    created_at: DateTime<Utc>,
    forward: HashMap<EntityType, HashMap<String, Placeholder>>,
    /// Canonical token -> original value.
    reverse: HashMap<String, String>,
    allocator: PlaceholderAllocator,
}

impl SessionMapping {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
            forward: HashMap::new(),
            reverse: HashMap::new(),
            allocator: PlaceholderAllocator::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Dedup-or-allocate: returns the existing placeholder for this
    /// (type, original) pair, or allocates the next index for the type and
    /// registers the pair.
    pub fn placeholder_for_value(&mut self, entity_type: &EntityType, original: &str) -> Placeholder {
        if let Some(existing) = self.forward.get(entity_type).and_then(|m| m.get(original)) {
            return existing.clone();
        }
        let placeholder = self.allocator.allocate(entity_type.clone());
        self.insert(entity_type.clone(), original.to_string(), placeholder.clone());
        placeholder
    }

    /// Explicit registration of a known pair. The allocator is advanced so
    /// the placeholder's index is never handed out a second time.
    pub fn add(&mut self, entity_type: EntityType, original: impl Into<String>, placeholder: Placeholder) {
        self.allocator.observe(&placeholder);
        self.insert(entity_type, original.into(), placeholder);
    }

    fn insert(&mut self, entity_type: EntityType, original: String, placeholder: Placeholder) {
        self.reverse.insert(placeholder.token(), original.clone());
        self.forward
            .entry(entity_type)
            .or_default()
            .insert(original, placeholder);
    }

    pub fn placeholder_for(&self, entity_type: &EntityType, original: &str) -> Option<&Placeholder> {
        self.forward.get(entity_type).and_then(|m| m.get(original))
    }

    /// Lookup by canonical token. Non-destructive: the same placeholder can
    /// be resolved any number of times.
    pub fn original_for(&self, token: &str) -> Option<&str> {
        self.reverse.get(token).map(String::as_str)
    }

    pub fn original_for_placeholder(&self, placeholder: &Placeholder) -> Option<&str> {
        self.original_for(&placeholder.token())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.reverse.contains_key(token)
    }

    pub fn contains_type(&self, entity_type: &EntityType) -> bool {
        self.forward.contains_key(entity_type)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.forward.keys()
    }

    /// Number of registered placeholders.
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Byte length of the longest canonical token. Drives the streaming
    /// deanonymizer's holdback window.
    pub fn max_token_len(&self) -> usize {
        self.reverse.keys().map(String::len).max().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.allocator.reset();
    }

    pub fn to_portable(&self) -> PortableMapping {
        let mut mappings: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (entity_type, values) in &self.forward {
            let bucket = mappings.entry(entity_type.as_str().to_string()).or_default();
            for (original, placeholder) in values {
                bucket.insert(original.clone(), placeholder.token());
            }
        }
        PortableMapping {
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            mappings,
        }
    }

    pub fn from_portable(portable: PortableMapping) -> Result<Self, MappingCodecError> {
        let mut mapping = SessionMapping {
            session_id: portable.session_id,
            created_at: portable.created_at,
            forward: HashMap::new(),
            reverse: HashMap::new(),
            allocator: PlaceholderAllocator::new(),
        };
        for (entity_type, values) in portable.mappings {
            let entity_type = EntityType::new(entity_type);
            for (original, token) in values {
                let placeholder = Placeholder::parse(&token)
                    .ok_or_else(|| MappingCodecError::InvalidPlaceholder(token.clone()))?;
                if let Some(existing) = mapping.reverse.get(&token) {
                    if existing != &original {
                        return Err(MappingCodecError::DuplicatePlaceholder(token));
                    }
                }
                mapping.add(entity_type.clone(), original, placeholder);
            }
        }
        Ok(mapping)
    }
}

/// Wire/storage form of a session mapping.
///
/// `BTreeMap`s keep the serialized payload deterministic, which makes store
/// payloads diffable and test assertions stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableMapping {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    /// entityType -> original -> placeholder token
    pub mappings: BTreeMap<String, BTreeMap<String, String>>,
}
