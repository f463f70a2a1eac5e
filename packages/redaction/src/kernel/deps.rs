//! Gateway dependencies (using traits for testability)
//!
//! This module provides the dependency container for the redaction gateway.
//! All injected capabilities use trait abstractions so tests can substitute
//! fakes without touching the pipeline.

use std::sync::Arc;

use anyhow::Result;

use crate::common::redaction::deanonymizer::Deanonymizer;
use crate::common::secrets::interceptor::SecretInterceptor;
use crate::config::{Config, StoreBackend};
use crate::kernel::allowlist::NoopAllowlist;
use crate::kernel::anonymizer::Anonymizer;
use crate::kernel::gateway::RedactionGateway;
use crate::kernel::recognizers::create_entity_recognizer;
use crate::kernel::traits::{BaseAllowlist, BaseEntityRecognizer, BaseMappingStore};
use crate::store::{InMemoryMappingStore, RedisMappingStore};

/// Injected capabilities behind the gateway.
#[derive(Clone)]
pub struct GatewayDeps {
    pub recognizer: Arc<dyn BaseEntityRecognizer>,
    pub allowlist: Arc<dyn BaseAllowlist>,
    pub store: Arc<dyn BaseMappingStore>,
}

impl GatewayDeps {
    pub fn new(
        recognizer: Arc<dyn BaseEntityRecognizer>,
        allowlist: Arc<dyn BaseAllowlist>,
        store: Arc<dyn BaseMappingStore>,
    ) -> Self {
        Self {
            recognizer,
            allowlist,
            store,
        }
    }
}

/// Assemble a gateway from explicit dependencies plus config policy.
pub fn build_gateway(deps: GatewayDeps, config: &Config) -> RedactionGateway {
    let anonymizer =
        Anonymizer::new(deps.recognizer, deps.allowlist).with_min_score(config.min_entity_score);
    let deanonymizer = Deanonymizer::new(config.fuzzy_matching_enabled);
    let interceptor = SecretInterceptor::new(config.secret_block_levels.iter().copied());

    RedactionGateway::new(
        anonymizer,
        deanonymizer,
        interceptor,
        deps.store,
        config.mapping_ttl,
        config.dedup_scope,
    )
}

/// Create a gateway wired from configuration alone: structured recognizer,
/// empty allowlist, and the configured store backend.
///
/// The in-process backend is only safe for single-process deployments;
/// multiple processes sharing session state must point `MAPPING_STORE` at
/// redis.
pub async fn create_gateway(config: &Config) -> Result<RedactionGateway> {
    let store: Arc<dyn BaseMappingStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("mapping store: in-process (single-process deployments only)");
            Arc::new(InMemoryMappingStore::new())
        }
        StoreBackend::Redis => {
            tracing::info!(url = %config.redis_url, "mapping store: redis");
            Arc::new(RedisMappingStore::connect(&config.redis_url).await?)
        }
    };

    let deps = GatewayDeps::new(
        create_entity_recognizer(config.recognition_enabled),
        Arc::new(NoopAllowlist::new()),
        store,
    );

    Ok(build_gateway(deps, config))
}
