//! Bounded-grammar recognition of placeholder tokens reformatted by the
//! upstream model.
//!
//! Models echo placeholders back in mangled forms: `<person_1>`,
//! `<PERSON 1>`, `[PERSON_1]`, `{{PERSON_1}}`. Recognition here is a small
//! closed grammar over exactly those deviations — case in the type token,
//! `_`/`-`/space as the type/index separator, and `[]`/`{{}}` bracket
//! swaps. Generic edit-distance matching is deliberately off the table: it
//! would start "correcting" ordinary text that merely resembles a
//! placeholder.

use lazy_static::lazy_static;
use regex::Regex;

use crate::common::placeholder::Placeholder;
use crate::common::types::EntityType;

lazy_static! {
    /// Candidate scanner: any short angle/square/double-brace bracketed
    /// run. Classification of a candidate happens after the scan; tokens
    /// longer than the grammar allows are never placeholders.
    pub(crate) static ref CANDIDATE: Regex =
        Regex::new(r"\{\{[^{}]{1,64}\}\}|<[^<>]{1,64}>|\[[^\[\]]{1,64}\]")
            .expect("candidate scanner regex");

    /// Inner grammar: identifier words joined by `_`, `-` or a single
    /// space, then one separator and a positive decimal index.
    static ref INNER: Regex =
        Regex::new(r"^([A-Za-z][A-Za-z0-9]*(?:[ _-][A-Za-z][A-Za-z0-9]*)*)[ _-]([1-9][0-9]*)$")
            .expect("inner grammar regex");
}

/// How far a recognized token deviated from the canonical wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Case,
    Separator,
    Bracket,
}

/// A placeholder-like token recognized in model output.
#[derive(Debug, Clone)]
pub struct FuzzyMatch {
    /// The raw text as it appeared, brackets included.
    pub raw_span: String,
    /// The canonical `<TYPE_N>` token the raw span normalizes to.
    pub normalized_form: String,
    pub resolved_type: EntityType,
    pub resolved_index: u32,
    pub match_kind: MatchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BracketStyle {
    Angle,
    Square,
    DoubleBrace,
}

fn strip_brackets(raw: &str) -> Option<(&str, BracketStyle)> {
    if let Some(inner) = raw.strip_prefix("{{").and_then(|r| r.strip_suffix("}}")) {
        return Some((inner, BracketStyle::DoubleBrace));
    }
    if let Some(inner) = raw.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
        return Some((inner, BracketStyle::Angle));
    }
    if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return Some((inner, BracketStyle::Square));
    }
    None
}

/// Normalize one bracketed candidate to its canonical `(TYPE, N)` pair.
///
/// Returns `None` when the candidate falls outside the bounded grammar;
/// such text is left untouched by the deanonymizer.
pub fn normalize_candidate(raw: &str) -> Option<FuzzyMatch> {
    let (inner, bracket) = strip_brackets(raw)?;
    let inner = inner.trim();
    let caps = INNER.captures(inner)?;

    let type_part = caps.get(1)?.as_str();
    let resolved_index: u32 = caps.get(2)?.as_str().parse().ok()?;
    let resolved_type = EntityType::new(type_part);
    if resolved_type.as_str().is_empty() {
        return None;
    }

    let normalized = Placeholder::new(resolved_type.clone(), resolved_index);
    let normalized_form = normalized.token();

    let match_kind = if raw == normalized_form {
        MatchKind::Exact
    } else if bracket != BracketStyle::Angle {
        MatchKind::Bracket
    } else if type_part.contains([' ', '-']) || inner.len() != raw.len() - 2 {
        MatchKind::Separator
    } else if type_part.chars().any(|c| c.is_ascii_lowercase()) {
        MatchKind::Case
    } else {
        // Same brackets, same case, underscore separator, but not
        // byte-identical (stray interior spacing): treat as a separator
        // deviation.
        MatchKind::Separator
    };

    Some(FuzzyMatch {
        raw_span: raw.to_string(),
        normalized_form,
        resolved_type,
        resolved_index,
        match_kind,
    })
}

/// Whether a candidate still reads as a placeholder with no mapping to
/// resolve against: the canonical form, or a bracket/separator variant
/// whose type token is written in caps. Lowercase variants are excluded
/// here because without known types they are indistinguishable from
/// ordinary bracketed text.
pub(crate) fn is_bare_placeholder_like(raw: &str) -> bool {
    if Placeholder::parse(raw).is_some() {
        return true;
    }
    let Some((inner, _)) = strip_brackets(raw) else {
        return false;
    };
    let inner = inner.trim();
    match INNER.captures(inner) {
        Some(caps) => caps[1]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ' ' | '_' | '-')),
        None => false,
    }
}
