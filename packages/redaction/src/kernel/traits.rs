// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no redaction logic. The algorithms
// live in `common`; implementations behind these traits get swapped per
// deployment (and mocked in tests).
//
// Naming convention: Base* for trait names (e.g., BaseEntityRecognizer)

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::common::mapping::SessionMapping;
use crate::common::types::{DetectedSpan, EntityType};
use crate::store::StoreError;

// =============================================================================
// Entity Recognition Trait (Infrastructure - injected NLP capability)
// =============================================================================

#[async_trait]
pub trait BaseEntityRecognizer: Send + Sync {
    /// Detect typed entity spans in `text`. `language` is a hint ("en",
    /// "zh"); implementations may ignore it.
    ///
    /// A failure here is terminal for the surrounding anonymization call:
    /// callers must never fall back to forwarding unredacted text.
    async fn detect(&self, text: &str, language: &str) -> Result<Vec<DetectedSpan>>;
}

// =============================================================================
// Allowlist Trait (Infrastructure)
// =============================================================================

pub trait BaseAllowlist: Send + Sync {
    /// Whether this exact (entity type, text) pair is exempt from redaction.
    fn is_exempt(&self, entity_type: &EntityType, text: &str) -> bool;
}

// =============================================================================
// Mapping Store Trait (Infrastructure - session mapping persistence)
// =============================================================================

/// Time-bounded, tenant-namespaced persistence for session mappings.
///
/// Every operation is scoped by `(tenant_id, session_id)`; tenants can
/// neither observe nor collide with each other's sessions. Entries expire
/// on their TTL unless refreshed with `extend_ttl`.
#[async_trait]
pub trait BaseMappingStore: Send + Sync {
    async fn save(
        &self,
        tenant_id: &str,
        session_id: &str,
        mapping: &SessionMapping,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionMapping>, StoreError>;

    /// Returns whether an entry existed.
    async fn delete(&self, tenant_id: &str, session_id: &str) -> Result<bool, StoreError>;

    async fn exists(&self, tenant_id: &str, session_id: &str) -> Result<bool, StoreError>;

    /// Reset the expiry countdown. Returns false when the entry is already
    /// gone.
    async fn extend_ttl(
        &self,
        tenant_id: &str,
        session_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Bulk-remove every session belonging to one tenant. Returns the
    /// number of entries removed.
    async fn delete_tenant_keys(&self, tenant_id: &str) -> Result<u64, StoreError>;
}
