// Anonymization pipeline: recognition -> conflict resolution -> allowlist
// filtering -> placeholder substitution.

use std::sync::Arc;

use crate::common::mapping::SessionMapping;
use crate::common::redaction::spans::{resolve_overlaps, substitute_spans, AnonymizeOutcome};
use crate::common::types::DetectedSpan;
use crate::kernel::gateway::GatewayError;
use crate::kernel::traits::{BaseAllowlist, BaseEntityRecognizer};

/// Turns raw text into redacted text plus an updated session mapping.
///
/// Constructed once at startup and shared by reference into the request
/// context; holds no per-request state.
pub struct Anonymizer {
    recognizer: Arc<dyn BaseEntityRecognizer>,
    allowlist: Arc<dyn BaseAllowlist>,
    min_score: f32,
}

impl Anonymizer {
    pub fn new(recognizer: Arc<dyn BaseEntityRecognizer>, allowlist: Arc<dyn BaseAllowlist>) -> Self {
        Self {
            recognizer,
            allowlist,
            min_score: 0.0,
        }
    }

    /// Discard recognizer candidates below `min_score` before conflict
    /// resolution.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Redact `text`, registering placeholders in `mapping`.
    ///
    /// Fail-closed: when the recognition call errors, the whole call aborts
    /// with [`GatewayError::Recognition`] — the original text is never
    /// returned as a fallback. The mapping is mutated in place; persisting
    /// it is left to the caller.
    pub async fn anonymize(
        &self,
        text: &str,
        language: &str,
        mapping: &mut SessionMapping,
    ) -> Result<AnonymizeOutcome, GatewayError> {
        let candidates = self
            .recognizer
            .detect(text, language)
            .await
            .map_err(GatewayError::Recognition)?;

        let candidates: Vec<DetectedSpan> = candidates
            .into_iter()
            .filter(|span| span.score >= self.min_score)
            .collect();

        let resolved = resolve_overlaps(candidates);

        let spans: Vec<DetectedSpan> = resolved
            .into_iter()
            .filter(|span| !self.allowlist.is_exempt(&span.entity_type, &span.text))
            .collect();

        let outcome = substitute_spans(text, &spans, mapping);

        tracing::debug!(
            session_id = mapping.session_id(),
            replacements = outcome.total_replacements(),
            newly_allocated = outcome.newly_allocated,
            "anonymization complete"
        );

        Ok(outcome)
    }
}
