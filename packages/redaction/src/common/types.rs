// Common types shared between the kernel and redaction layers
//
// These types are shared between the recognition port, the anonymizer and
// the mapping layer to avoid circular dependencies while maintaining type
// safety.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in entity categories emitted by the structured recognizer.
/// External recognizers may emit any other category token.
pub const PERSON: &str = "PERSON";
pub const EMAIL: &str = "EMAIL";
pub const PHONE: &str = "PHONE";
pub const ID_NUMBER: &str = "ID_NUMBER";
pub const CREDIT_CARD: &str = "CREDIT_CARD";
pub const IP_ADDRESS: &str = "IP_ADDRESS";

/// Entity category attached to a detected span.
///
/// Stored as the uppercase ASCII token that appears inside placeholder
/// tokens (the `PERSON` in `<PERSON_1>`). The constructor normalizes case
/// and maps space/hyphen separators to underscores so recognizer output and
/// reformatted tokens converge on one canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(token: impl AsRef<str>) -> Self {
        let normalized: String = token
            .as_ref()
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// A typed text span reported by an entity recognizer.
///
/// `start`/`end` are byte offsets into the scanned text and must lie on
/// char boundaries with `0 <= start < end <= text.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedSpan {
    pub entity_type: EntityType,
    pub start: usize,
    pub end: usize,
    /// Recognizer confidence in [0.0, 1.0].
    pub score: f32,
    /// The exact matched text, as sliced from the input.
    pub text: String,
}

impl DetectedSpan {
    pub fn new(
        entity_type: impl Into<EntityType>,
        start: usize,
        end: usize,
        score: f32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            start,
            end,
            score,
            text: text.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether the two spans share at least one byte.
    pub fn overlaps(&self, other: &DetectedSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether the span slices cleanly out of `text` and matches the
    /// recorded value. Spans failing this are dropped by the anonymizer.
    pub fn slices(&self, text: &str) -> bool {
        self.start < self.end
            && text
                .get(self.start..self.end)
                .map(|s| s == self.text)
                .unwrap_or(false)
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> Self {
        entity_type.0
    }
}
