//! Mapping store backends.
//!
//! Two interchangeable implementations of
//! [`crate::kernel::traits::BaseMappingStore`]:
//!
//! - [`InMemoryMappingStore`]: in-process map with a background expiry
//!   sweep. Concurrency-safe within one process, unusable across several.
//! - [`RedisMappingStore`]: shared redis instance leaning on native key
//!   expiry for TTL. Required when the service runs as multiple
//!   independent processes sharing session state.

pub mod memory;
pub mod redis;

pub use memory::InMemoryMappingStore;
pub use redis::RedisMappingStore;

/// Persistence-layer failures. These always propagate; a mapping is never
/// silently dropped.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mapping store backend error: {0}")]
    Backend(String),

    #[error("failed to serialize session mapping")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt session mapping payload: {0}")]
    Corrupt(String),
}
