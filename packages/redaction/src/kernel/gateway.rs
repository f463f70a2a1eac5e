// Request-scoped orchestration of the redaction flow
//
// Inbound:  secret check -> anonymize -> persist mapping -> forward upstream
// Outbound: load mapping -> deanonymize (whole text or incrementally)
//
// The gateway is an explicitly constructed service instance, created once
// at startup and passed by reference into the request-handling context. No
// hidden global state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use uuid::Uuid;

use crate::common::mapping::SessionMapping;
use crate::common::redaction::deanonymizer::{Deanonymizer, DeanonymizeOutcome};
use crate::common::redaction::streaming::deanonymize_stream;
use crate::common::secrets::interceptor::{InterceptorStats, SecretInterceptor, SecretMatch};
use crate::common::types::EntityType;
use crate::kernel::anonymizer::Anonymizer;
use crate::kernel::traits::BaseMappingStore;
use crate::store::StoreError;

/// Failures surfaced by the gateway. Unresolved placeholders and missing
/// mappings are outcomes, not errors — see [`DeanonymizeOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The recognition call failed; anonymization aborts entirely rather
    /// than returning unredacted text.
    #[error("entity recognition failed: {0}")]
    Recognition(anyhow::Error),

    /// Pre-flight secret scan refused the content.
    #[error("request blocked: {reason}")]
    SecretBlocked {
        reason: String,
        matches: Vec<SecretMatch>,
    },

    /// Persistence-layer failure; mappings are never silently dropped.
    #[error("mapping store failure")]
    Store(#[from] StoreError),
}

/// How long placeholder dedup state survives.
///
/// `Session` reloads the stored mapping each turn, so a value seen in turn
/// one keeps its placeholder in turn five. `Request` starts every call from
/// an empty mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupScope {
    Session,
    Request,
}

/// Result of processing one inbound request.
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    pub redacted_text: String,
    pub session_id: String,
    /// Replacements per entity type, repeats included.
    pub counts: HashMap<EntityType, usize>,
    pub newly_allocated: usize,
}

/// The privacy boundary between clients and the upstream model.
pub struct RedactionGateway {
    anonymizer: Anonymizer,
    deanonymizer: Deanonymizer,
    interceptor: SecretInterceptor,
    store: Arc<dyn BaseMappingStore>,
    mapping_ttl: Duration,
    dedup_scope: DedupScope,
}

impl RedactionGateway {
    pub fn new(
        anonymizer: Anonymizer,
        deanonymizer: Deanonymizer,
        interceptor: SecretInterceptor,
        store: Arc<dyn BaseMappingStore>,
        mapping_ttl: Duration,
        dedup_scope: DedupScope,
    ) -> Self {
        Self {
            anonymizer,
            deanonymizer,
            interceptor,
            store,
            mapping_ttl,
            dedup_scope,
        }
    }

    /// Redact one inbound text before it leaves the trust boundary.
    ///
    /// The secret interceptor runs first and independently: content over
    /// the risk threshold is refused before recognition or anonymization
    /// ever see it. On success the updated mapping is persisted under
    /// `(tenant_id, session_id)` with the configured TTL.
    pub async fn process_inbound(
        &self,
        tenant_id: &str,
        session_id: &str,
        text: &str,
        language: &str,
    ) -> Result<InboundOutcome, GatewayError> {
        let request_id = Uuid::new_v4();

        let intercept = self.interceptor.check(text);
        if intercept.should_block {
            tracing::warn!(
                request_id = %request_id,
                tenant_id,
                session_id,
                "inbound text refused by secret interceptor"
            );
            return Err(GatewayError::SecretBlocked {
                reason: intercept
                    .reason
                    .unwrap_or_else(|| "content contains secret material".to_string()),
                matches: intercept.matches,
            });
        }

        let mut mapping = match self.dedup_scope {
            DedupScope::Session => self
                .store
                .get(tenant_id, session_id)
                .await?
                .unwrap_or_else(|| SessionMapping::new(session_id)),
            DedupScope::Request => SessionMapping::new(session_id),
        };

        let outcome = self.anonymizer.anonymize(text, language, &mut mapping).await?;

        self.store
            .save(tenant_id, session_id, &mapping, self.mapping_ttl)
            .await?;

        tracing::info!(
            request_id = %request_id,
            tenant_id,
            session_id,
            replacements = outcome.total_replacements(),
            "inbound text redacted"
        );

        Ok(InboundOutcome {
            redacted_text: outcome.redacted_text,
            session_id: session_id.to_string(),
            counts: outcome.counts,
            newly_allocated: outcome.newly_allocated,
        })
    }

    /// Restore original values in a complete model response.
    ///
    /// A missing or expired mapping is not an error: the text comes back
    /// unchanged with every placeholder-like token reported unresolved.
    pub async fn process_response(
        &self,
        tenant_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<DeanonymizeOutcome, GatewayError> {
        match self.store.get(tenant_id, session_id).await? {
            Some(mapping) => Ok(self.deanonymizer.deanonymize(text, &mapping)),
            None => {
                tracing::warn!(tenant_id, session_id, "session mapping missing or expired");
                Ok(self.deanonymizer.deanonymize_without_mapping(text))
            }
        }
    }

    /// Restore original values in a streamed model response.
    ///
    /// Output is withheld in a bounded trailing buffer so a placeholder
    /// split across chunks is neither missed nor partially leaked. Dropping
    /// the returned stream (client disconnect) discards buffered content;
    /// the stored mapping keeps expiring on its own TTL.
    pub async fn process_response_stream<S>(
        &self,
        tenant_id: &str,
        session_id: &str,
        stream: S,
    ) -> Result<impl Stream<Item = String>, GatewayError>
    where
        S: Stream<Item = String> + Send + 'static,
    {
        let mapping = match self.store.get(tenant_id, session_id).await? {
            Some(mapping) => mapping,
            None => {
                tracing::warn!(tenant_id, session_id, "session mapping missing or expired");
                SessionMapping::new(session_id)
            }
        };
        Ok(deanonymize_stream(stream, self.deanonymizer.clone(), mapping))
    }

    /// Drop a session's mapping ahead of its TTL.
    pub async fn end_session(&self, tenant_id: &str, session_id: &str) -> Result<bool, GatewayError> {
        Ok(self.store.delete(tenant_id, session_id).await?)
    }

    /// Reset a session's expiry countdown.
    pub async fn extend_session(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<bool, GatewayError> {
        Ok(self
            .store
            .extend_ttl(tenant_id, session_id, self.mapping_ttl)
            .await?)
    }

    pub fn interceptor_stats(&self) -> InterceptorStats {
        self.interceptor.stats()
    }
}
