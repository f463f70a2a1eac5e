// Common test utilities

use std::sync::Arc;
use std::time::Duration;

use redaction_core::common::mapping::SessionMapping;
use redaction_core::common::redaction::Deanonymizer;
use redaction_core::common::secrets::SecretInterceptor;
use redaction_core::common::types::EntityType;
use redaction_core::kernel::{
    Anonymizer, BaseMappingStore, DedupScope, NoopAllowlist, RedactionGateway,
    RegexEntityRecognizer,
};
use redaction_core::store::InMemoryMappingStore;

pub const TENANT: &str = "tenant-a";

/// Opt-in log output for debugging test failures (`RUST_LOG=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Gateway over the structured recognizer and an in-process store.
pub fn build_gateway(store: Arc<dyn BaseMappingStore>, ttl: Duration) -> RedactionGateway {
    RedactionGateway::new(
        Anonymizer::new(
            Arc::new(RegexEntityRecognizer::new()),
            Arc::new(NoopAllowlist::new()),
        ),
        Deanonymizer::new(true),
        SecretInterceptor::with_default_block_levels(),
        store,
        ttl,
        DedupScope::Session,
    )
}

pub fn memory_gateway() -> RedactionGateway {
    init_tracing();
    build_gateway(
        Arc::new(InMemoryMappingStore::with_sweep_interval(Duration::from_secs(3600))),
        Duration::from_secs(60),
    )
}

/// The PERSON/PHONE mapping used across rehydration tests.
pub fn sample_mapping(session_id: &str) -> SessionMapping {
    let mut mapping = SessionMapping::new(session_id);
    mapping.placeholder_for_value(&EntityType::new("PERSON"), "张三");
    mapping.placeholder_for_value(&EntityType::new("PHONE"), "13800138000");
    mapping
}
