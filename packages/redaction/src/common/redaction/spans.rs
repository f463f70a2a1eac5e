// Span conflict resolution and placeholder substitution.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::common::mapping::SessionMapping;
use crate::common::types::{DetectedSpan, EntityType};

/// Result of substituting placeholders into one text.
#[derive(Debug, Clone, Default)]
pub struct AnonymizeOutcome {
    pub redacted_text: String,
    /// Replacements performed, per entity type (repeats included).
    pub counts: HashMap<EntityType, usize>,
    /// Placeholders allocated for values not previously in the mapping.
    pub newly_allocated: usize,
}

impl AnonymizeOutcome {
    pub fn total_replacements(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Resolve overlapping candidate spans into a non-overlapping set.
///
/// Higher confidence wins; on a tie the longer span is preferred; any span
/// overlapping a retained higher-priority span is dropped (which covers the
/// fully-contained case). The result is sorted by start offset.
pub fn resolve_overlaps(mut spans: Vec<DetectedSpan>) -> Vec<DetectedSpan> {
    spans.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut retained: Vec<DetectedSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if retained.iter().all(|kept| !kept.overlaps(&span)) {
            retained.push(span);
        }
    }
    retained.sort_by_key(|s| s.start);
    retained
}

/// Rebuild `text` with each span replaced by its placeholder token.
///
/// Spans must be sorted and non-overlapping (the output of
/// [`resolve_overlaps`]). The output is built once by concatenation from the
/// span list, so no offset arithmetic against already-mutated text is ever
/// needed. The mapping is mutated in place; persisting it is the caller's
/// concern.
pub fn substitute_spans(
    text: &str,
    spans: &[DetectedSpan],
    mapping: &mut SessionMapping,
) -> AnonymizeOutcome {
    let mut redacted = String::with_capacity(text.len());
    let mut counts: HashMap<EntityType, usize> = HashMap::new();
    let mut newly_allocated = 0usize;
    let mut cursor = 0usize;

    for span in spans {
        if span.start < cursor || !span.slices(text) {
            tracing::warn!(
                entity_type = %span.entity_type,
                start = span.start,
                end = span.end,
                "dropping span that does not slice cleanly from input"
            );
            continue;
        }
        redacted.push_str(&text[cursor..span.start]);

        let before = mapping.len();
        let placeholder = mapping.placeholder_for_value(&span.entity_type, &span.text);
        newly_allocated += mapping.len() - before;

        redacted.push_str(&placeholder.token());
        *counts.entry(span.entity_type.clone()).or_insert(0) += 1;
        cursor = span.end;
    }
    redacted.push_str(&text[cursor..]);

    AnonymizeOutcome {
        redacted_text: redacted,
        counts,
        newly_allocated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{EMAIL, PERSON, PHONE};

    #[test]
    fn test_higher_score_wins() {
        let spans = vec![
            DetectedSpan::new(PERSON, 0, 5, 0.6, "Alice"),
            DetectedSpan::new(EMAIL, 2, 8, 0.9, "ice@x."),
        ];
        let resolved = resolve_overlaps(spans);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].entity_type, EMAIL.into());
    }

    #[test]
    fn test_tie_prefers_longer_span() {
        let spans = vec![
            DetectedSpan::new(PHONE, 0, 4, 0.8, "1380"),
            DetectedSpan::new(PHONE, 0, 11, 0.8, "13800138000"),
        ];
        let resolved = resolve_overlaps(spans);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].text, "13800138000");
    }

    #[test]
    fn test_contained_span_dropped() {
        let spans = vec![
            DetectedSpan::new(EMAIL, 0, 16, 0.9, "john@example.com"),
            DetectedSpan::new(PERSON, 0, 4, 0.5, "john"),
        ];
        let resolved = resolve_overlaps(spans);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].entity_type, EMAIL.into());
    }

    #[test]
    fn test_disjoint_spans_sorted_by_start() {
        let spans = vec![
            DetectedSpan::new(PHONE, 10, 21, 0.9, "13800138000"),
            DetectedSpan::new(PERSON, 0, 5, 0.5, "Alice"),
        ];
        let resolved = resolve_overlaps(spans);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].start, 0);
        assert_eq!(resolved[1].start, 10);
    }

    #[test]
    fn test_substitution_rebuilds_text() {
        let text = "Alice called 13800138000";
        let spans = vec![
            DetectedSpan::new(PERSON, 0, 5, 0.9, "Alice"),
            DetectedSpan::new(PHONE, 13, 24, 0.9, "13800138000"),
        ];
        let mut mapping = SessionMapping::new("s-1");
        let outcome = substitute_spans(text, &spans, &mut mapping);

        assert_eq!(outcome.redacted_text, "<PERSON_1> called <PHONE_1>");
        assert_eq!(outcome.newly_allocated, 2);
        assert_eq!(outcome.total_replacements(), 2);
        assert_eq!(mapping.original_for("<PERSON_1>"), Some("Alice"));
    }

    #[test]
    fn test_repeated_value_reuses_placeholder() {
        let text = "Alice met Alice";
        let spans = vec![
            DetectedSpan::new(PERSON, 0, 5, 0.9, "Alice"),
            DetectedSpan::new(PERSON, 10, 15, 0.9, "Alice"),
        ];
        let mut mapping = SessionMapping::new("s-1");
        let outcome = substitute_spans(text, &spans, &mut mapping);

        assert_eq!(outcome.redacted_text, "<PERSON_1> met <PERSON_1>");
        assert_eq!(outcome.newly_allocated, 1);
        assert_eq!(outcome.counts[&EntityType::new(PERSON)], 2);
    }

    #[test]
    fn test_stale_span_is_skipped() {
        let text = "hello world";
        let spans = vec![DetectedSpan::new(PERSON, 0, 5, 0.9, "HELLO")];
        let mut mapping = SessionMapping::new("s-1");
        let outcome = substitute_spans(text, &spans, &mut mapping);
        assert_eq!(outcome.redacted_text, text);
        assert_eq!(outcome.newly_allocated, 0);
    }
}
