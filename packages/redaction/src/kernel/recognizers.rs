// Entity Recognizer Implementations

use anyhow::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::common::types::{DetectedSpan, CREDIT_CARD, EMAIL, ID_NUMBER, IP_ADDRESS, PHONE};
use crate::kernel::traits::BaseEntityRecognizer;

// =============================================================================
// Regex-based Recognizer (structured PII, no model)
// =============================================================================

lazy_static! {
    // Email pattern - RFC 5322 simplified
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b"
    ).expect("email regex");

    // Phone patterns - North American forms plus CN mobile numbers
    static ref PHONE_REGEX: Regex = Regex::new(
        r"(?:\+?1[-.\s]?)?\(?([0-9]{3})\)?[-.\s]?([0-9]{3})[-.\s]?([0-9]{4})|\b1[3-9][0-9]{9}\b"
    ).expect("phone regex");

    // National id - SSN-style XXX-XX-XXXX and 18-digit CN resident ids
    static ref ID_NUMBER_REGEX: Regex = Regex::new(
        r"\b\d{3}-\d{2}-\d{4}\b|\b\d{17}[\dXx]\b"
    ).expect("id number regex");

    // Credit card numbers - various formats (validated with Luhn below)
    static ref CREDIT_CARD_REGEX: Regex = Regex::new(
        r"\b(?:\d{4}[-\s]?){3}\d{4}\b|\b\d{4}[-\s]?\d{6}[-\s]?\d{5}\b"
    ).expect("credit card regex");

    // IPv4 addresses
    static ref IPV4_REGEX: Regex = Regex::new(
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b"
    ).expect("ipv4 regex");

    // IPv6 addresses (simplified)
    static ref IPV6_REGEX: Regex = Regex::new(
        r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b"
    ).expect("ipv6 regex");
}

/// Fast regex-based recognizer for structured PII: emails, phones, national
/// ids, credit cards, IPs. Names, addresses and other unstructured PII need
/// a model-backed recognizer injected behind the same trait.
pub struct RegexEntityRecognizer;

impl RegexEntityRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RegexEntityRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEntityRecognizer for RegexEntityRecognizer {
    async fn detect(&self, text: &str, _language: &str) -> Result<Vec<DetectedSpan>> {
        Ok(detect_structured(text))
    }
}

/// Detect structured PII candidates. Overlap resolution happens downstream;
/// this just reports everything each pattern finds.
fn detect_structured(text: &str) -> Vec<DetectedSpan> {
    let mut spans = Vec::new();

    for mat in EMAIL_REGEX.find_iter(text) {
        spans.push(DetectedSpan::new(EMAIL, mat.start(), mat.end(), 0.95, mat.as_str()));
    }

    for mat in PHONE_REGEX.find_iter(text) {
        spans.push(DetectedSpan::new(PHONE, mat.start(), mat.end(), 0.80, mat.as_str()));
    }

    for mat in ID_NUMBER_REGEX.find_iter(text) {
        spans.push(DetectedSpan::new(ID_NUMBER, mat.start(), mat.end(), 0.90, mat.as_str()));
    }

    // Credit cards only count after Luhn validation
    for mat in CREDIT_CARD_REGEX.find_iter(text) {
        let digits: String = mat.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
        if is_valid_luhn(&digits) {
            spans.push(DetectedSpan::new(CREDIT_CARD, mat.start(), mat.end(), 0.90, mat.as_str()));
        }
    }

    for mat in IPV4_REGEX.find_iter(text) {
        // Filter out obvious non-IPs like version numbers
        if !is_likely_version_number(mat.as_str()) {
            spans.push(DetectedSpan::new(IP_ADDRESS, mat.start(), mat.end(), 0.70, mat.as_str()));
        }
    }

    for mat in IPV6_REGEX.find_iter(text) {
        spans.push(DetectedSpan::new(IP_ADDRESS, mat.start(), mat.end(), 0.70, mat.as_str()));
    }

    spans
}

/// Luhn checksum for credit card validation
fn is_valid_luhn(card_number: &str) -> bool {
    let digits: Vec<u32> = card_number.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, &digit)| {
            if idx % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    checksum % 10 == 0
}

/// Check if an IP-like string is likely a version number
fn is_likely_version_number(ip_str: &str) -> bool {
    let parts: Vec<&str> = ip_str.split('.').collect();
    if parts.len() != 4 {
        return false;
    }

    let has_leading_zero = parts[0] == "0";
    let has_trailing_zero = parts[3] == "0";
    let zero_count = parts.iter().filter(|&&p| p == "0").count();

    has_leading_zero || has_trailing_zero || zero_count >= 2
}

// =============================================================================
// No-op Recognizer (for testing or when recognition is disabled)
// =============================================================================

/// Recognizer that never detects anything. Used when redaction is disabled
/// via config; anonymization then passes text through untouched while the
/// secret interceptor still runs.
pub struct NoopEntityRecognizer;

impl NoopEntityRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopEntityRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEntityRecognizer for NoopEntityRecognizer {
    async fn detect(&self, _text: &str, _language: &str) -> Result<Vec<DetectedSpan>> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Factory function
// =============================================================================

/// Create an entity recognizer based on configuration. Model-backed
/// recognizers are constructed by their own crates and injected directly.
pub fn create_entity_recognizer(enabled: bool) -> Arc<dyn BaseEntityRecognizer> {
    if enabled {
        tracing::info!("entity recognition enabled with structured regex recognizer");
        Arc::new(RegexEntityRecognizer::new())
    } else {
        tracing::info!("entity recognition disabled");
        Arc::new(NoopEntityRecognizer::new())
    }
}
