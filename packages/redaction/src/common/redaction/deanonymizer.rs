// Restores original values for placeholders echoed back by the model.

use crate::common::mapping::SessionMapping;
use crate::common::placeholder::Placeholder;

use super::fuzzy;

/// Result of one deanonymization pass.
#[derive(Debug, Clone)]
pub struct DeanonymizeOutcome {
    pub restored_text: String,
    /// Every substituted occurrence, repeats included.
    pub replaced_count: usize,
    /// True iff no unresolved placeholder-like token remains.
    pub is_complete: bool,
    /// Literal tokens that looked like placeholders but could not be
    /// resolved against the mapping.
    pub unresolved: Vec<String>,
}

/// Placeholder rehydration over model output.
///
/// Scans left to right and produces a new string in a single pass; it never
/// patches the input in place, so earlier replacements cannot invalidate
/// later offsets. Reverse lookups are non-destructive: the same placeholder
/// occurring ten times is replaced ten times.
#[derive(Debug, Clone)]
pub struct Deanonymizer {
    fuzzy_enabled: bool,
}

impl Deanonymizer {
    pub fn new(fuzzy_enabled: bool) -> Self {
        Self { fuzzy_enabled }
    }

    pub fn fuzzy_enabled(&self) -> bool {
        self.fuzzy_enabled
    }

    pub fn deanonymize(&self, text: &str, mapping: &SessionMapping) -> DeanonymizeOutcome {
        let mut restored = String::with_capacity(text.len());
        let mut replaced_count = 0usize;
        let mut unresolved: Vec<String> = Vec::new();
        let mut cursor = 0usize;

        for candidate in fuzzy::CANDIDATE.find_iter(text) {
            restored.push_str(&text[cursor..candidate.start()]);
            cursor = candidate.end();
            let raw = candidate.as_str();

            // Exact pass: the canonical token goes straight to the reverse
            // table.
            if let Some(original) = mapping.original_for(raw) {
                restored.push_str(original);
                replaced_count += 1;
                continue;
            }

            if !self.fuzzy_enabled {
                // Canonical-shaped but unknown: report it. Anything else is
                // ordinary bracketed text.
                if Placeholder::parse(raw).is_some() {
                    unresolved.push(raw.to_string());
                }
                restored.push_str(raw);
                continue;
            }

            match fuzzy::normalize_candidate(raw) {
                Some(fuzzy_match) => {
                    if let Some(original) = mapping.original_for(&fuzzy_match.normalized_form) {
                        restored.push_str(original);
                        replaced_count += 1;
                    } else {
                        // Unknown normalized pair. Canonical tokens are
                        // always placeholder-like; variants only count when
                        // their type is one this mapping actually uses —
                        // `[note_1]` in prose must not be flagged.
                        if Placeholder::parse(raw).is_some()
                            || mapping.contains_type(&fuzzy_match.resolved_type)
                        {
                            unresolved.push(raw.to_string());
                        }
                        restored.push_str(raw);
                    }
                }
                None => restored.push_str(raw),
            }
        }
        restored.push_str(&text[cursor..]);

        DeanonymizeOutcome {
            restored_text: restored,
            replaced_count,
            is_complete: unresolved.is_empty(),
            unresolved,
        }
    }

    /// The expired-or-unknown-session path: nothing can be restored, the
    /// text comes back unchanged, and every placeholder-like token is
    /// reported unresolved.
    pub fn deanonymize_without_mapping(&self, text: &str) -> DeanonymizeOutcome {
        let mut unresolved: Vec<String> = Vec::new();
        for candidate in fuzzy::CANDIDATE.find_iter(text) {
            let raw = candidate.as_str();
            let placeholder_like = if self.fuzzy_enabled {
                fuzzy::is_bare_placeholder_like(raw)
            } else {
                Placeholder::parse(raw).is_some()
            };
            if placeholder_like {
                unresolved.push(raw.to_string());
            }
        }
        DeanonymizeOutcome {
            restored_text: text.to_string(),
            replaced_count: 0,
            is_complete: unresolved.is_empty(),
            unresolved,
        }
    }
}

impl Default for Deanonymizer {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::EntityType;

    fn sample_mapping() -> SessionMapping {
        let mut mapping = SessionMapping::new("s-1");
        mapping.placeholder_for_value(&EntityType::new("PERSON"), "张三");
        mapping.placeholder_for_value(&EntityType::new("PHONE"), "13800138000");
        mapping
    }

    #[test]
    fn test_concrete_scenario() {
        let mapping = sample_mapping();
        let outcome = Deanonymizer::new(true).deanonymize("<PERSON_1>的电话是<PHONE_1>", &mapping);
        assert_eq!(outcome.restored_text, "张三的电话是13800138000");
        assert_eq!(outcome.replaced_count, 2);
        assert!(outcome.is_complete);
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn test_repeated_placeholder_replaced_every_time() {
        let mapping = sample_mapping();
        let outcome =
            Deanonymizer::new(false).deanonymize("<PERSON_1>, <PERSON_1> and <PERSON_1>", &mapping);
        assert_eq!(outcome.restored_text, "张三, 张三 and 张三");
        assert_eq!(outcome.replaced_count, 3);
    }

    #[test]
    fn test_fuzzy_equivalence_when_enabled() {
        let mapping = sample_mapping();
        let deanonymizer = Deanonymizer::new(true);
        for raw in ["<PERSON 1>", "<person_1>", "[PERSON_1]", "{{PERSON_1}}", "<PERSON-1>"] {
            let outcome = deanonymizer.deanonymize(raw, &mapping);
            assert_eq!(outcome.restored_text, "张三", "raw: {raw}");
            assert_eq!(outcome.replaced_count, 1, "raw: {raw}");
        }
    }

    #[test]
    fn test_fuzzy_variants_do_not_resolve_when_disabled() {
        let mapping = sample_mapping();
        let deanonymizer = Deanonymizer::new(false);
        for raw in ["<PERSON 1>", "<person_1>", "[PERSON_1]", "{{PERSON_1}}", "<PERSON-1>"] {
            let outcome = deanonymizer.deanonymize(raw, &mapping);
            assert_eq!(outcome.restored_text, raw, "raw: {raw}");
            assert_eq!(outcome.replaced_count, 0, "raw: {raw}");
        }
    }

    #[test]
    fn test_unknown_index_reported_unresolved() {
        let mapping = sample_mapping();
        let outcome = Deanonymizer::new(true).deanonymize("call <PERSON_2> instead", &mapping);
        assert_eq!(outcome.restored_text, "call <PERSON_2> instead");
        assert!(!outcome.is_complete);
        assert_eq!(outcome.unresolved, vec!["<PERSON_2>".to_string()]);
    }

    #[test]
    fn test_unknown_type_in_prose_left_alone() {
        let mapping = sample_mapping();
        let outcome = Deanonymizer::new(true).deanonymize("see [note 1] and <html>", &mapping);
        assert_eq!(outcome.restored_text, "see [note 1] and <html>");
        assert!(outcome.is_complete);
    }

    #[test]
    fn test_known_type_variant_reported_unresolved() {
        let mapping = sample_mapping();
        let outcome = Deanonymizer::new(true).deanonymize("ask [person 9]", &mapping);
        assert!(!outcome.is_complete);
        assert_eq!(outcome.unresolved, vec!["[person 9]".to_string()]);
    }

    #[test]
    fn test_without_mapping_returns_text_unchanged() {
        let outcome = Deanonymizer::new(true)
            .deanonymize_without_mapping("<PERSON_1> and [PHONE_2] and [note 1]");
        assert_eq!(outcome.restored_text, "<PERSON_1> and [PHONE_2] and [note 1]");
        assert_eq!(outcome.replaced_count, 0);
        assert!(!outcome.is_complete);
        assert_eq!(
            outcome.unresolved,
            vec!["<PERSON_1>".to_string(), "[PHONE_2]".to_string()]
        );
    }

    #[test]
    fn test_text_without_placeholders_is_complete() {
        let mapping = sample_mapping();
        let outcome = Deanonymizer::new(true).deanonymize("nothing to see here", &mapping);
        assert_eq!(outcome.restored_text, "nothing to see here");
        assert_eq!(outcome.replaced_count, 0);
        assert!(outcome.is_complete);
    }

    #[test]
    fn test_adjacent_placeholders() {
        let mapping = sample_mapping();
        let outcome = Deanonymizer::new(true).deanonymize("<PERSON_1><PHONE_1>", &mapping);
        assert_eq!(outcome.restored_text, "张三13800138000");
        assert_eq!(outcome.replaced_count, 2);
    }
}
