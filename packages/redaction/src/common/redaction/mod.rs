//! Anonymization and rehydration primitives
//!
//! The pure half of the redaction pipeline: span conflict resolution,
//! placeholder substitution, and the two-pass restoration of model output.
//!
//! # Flow
//!
//! - **Outbound**: recognizer candidates -> [`spans::resolve_overlaps`] ->
//!   allowlist filter (kernel) -> [`spans::substitute_spans`]
//! - **Inbound**: exact token pass, then [`fuzzy`] normalization of
//!   reformatted tokens, via [`deanonymizer::Deanonymizer`]
//! - **Streamed inbound**: [`streaming::StreamingDeanonymizer`] holds back
//!   a bounded tail so split tokens reassemble
//!
//! Orchestration against the injected recognizer/allowlist/store lives in
//! the kernel; nothing in here performs IO.

pub mod deanonymizer;
pub mod fuzzy;
pub mod spans;
pub mod streaming;

pub use deanonymizer::{Deanonymizer, DeanonymizeOutcome};
pub use fuzzy::{normalize_candidate, FuzzyMatch, MatchKind};
pub use spans::{resolve_overlaps, substitute_spans, AnonymizeOutcome};
pub use streaming::{deanonymize_stream, StreamingDeanonymizer};
