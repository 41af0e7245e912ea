//! Scrubbers replace volatile substrings with stable placeholders before text
//! is written, so repeat runs produce identical received files.

use std::sync::Arc;

use regex::Regex;

use crate::error::{ApprovalError, ApprovalResult};

pub type Scrubber = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub const UUID_PLACEHOLDER: &str = "{{UUID}}";
pub const DATETIME_PLACEHOLDER: &str = "{{DATETIME}}";

const UUID_PATTERN: &str =
    r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

/// Known date/time layouts, tried in order against the example.
const DATETIME_PATTERNS: &[&str] = &[
    r"[A-Z][a-z]{2} [A-Z][a-z]{2} \d{1,2} \d{2}:\d{2}:\d{2}",
    r"[A-Z][a-z]{2} [A-Z][a-z]{2} \d{1,2} \d{2}:\d{2}:\d{2} [A-Z]{3,4} \d{4}",
    r"[A-Z][a-z]{2} [A-Z][a-z]{2} \d{1,2} \d{4} \d{2}:\d{2}:\d{2}\.\d{3}",
    r"[A-Z][a-z]{2} [A-Z][a-z]{2} \d{1,2} \d{2}:\d{2}:\d{2} [+-]\d{4} \d{4}",
    r"\d{1,2} [A-Z][a-z]{2} \d{4} \d{2}:\d{2}:\d{2},\d{3}",
    r"[A-Z][a-z]{2} \d{1,2}, \d{4} \d{1,2}:\d{2}:\d{2} (?:AM|PM) [A-Z]{3,4}",
    r"\d{2}:\d{2}:\d{2}",
    r"\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}\.\d{3}",
    r"\d{4}-\d{1,2}-\d{1,2}T\d{1,2}:\d{2}Z",
    r"\d{4}-\d{1,2}-\d{1,2}T\d{1,2}:\d{2}:\d{2}Z",
    r"\d{4}-\d{1,2}-\d{1,2}T\d{1,2}:\d{2}:\d{2}\.\d{3}Z",
    r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{6}",
    r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{6}",
    r"\d{8}T\d{6}Z",
    r"[A-Z][a-z]{2} [A-Z][a-z]{2} \d{1,2} \d{2}:\d{2}:\d{2} \d{4}",
    r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+-]\d{2}:\d{2}",
    r"\d{8}_\d{6}",
    r"\d{4}-\d{2}-\d{2}",
];

/// Apply scrubbers left to right.
#[must_use]
pub fn apply_scrubbers(text: &str, scrubbers: &[Scrubber]) -> String {
    scrubbers
        .iter()
        .fold(text.to_string(), |acc, scrub| scrub(&acc))
}

/// Replace every match of `pattern` with `replacement`.
///
/// # Errors
///
/// Returns `ApprovalError::InvalidPattern` if the pattern does not compile.
pub fn regex_scrubber(pattern: &str, replacement: impl Into<String>) -> ApprovalResult<Scrubber> {
    let regex = compile(pattern)?;
    let replacement = replacement.into();
    Ok(Arc::new(move |text: &str| {
        regex
            .replace_all(text, regex::NoExpand(&replacement))
            .into_owned()
    }))
}

/// Replace hyphenated UUIDs with `{{UUID}}`.
///
/// # Errors
///
/// Never in practice; the pattern is fixed.
pub fn uuid_scrubber() -> ApprovalResult<Scrubber> {
    regex_scrubber(UUID_PATTERN, UUID_PLACEHOLDER)
}

/// Build a scrubber for the layout of `example`, replacing every timestamp in
/// that layout with `{{DATETIME}}`.
///
/// # Errors
///
/// Returns `ApprovalError::NoDatetimeScrubberFound` when no known layout
/// matches the whole example.
pub fn datetime_scrubber(example: &str) -> ApprovalResult<Scrubber> {
    for pattern in DATETIME_PATTERNS {
        let anchored = compile(&format!("^(?:{pattern})$"))?;
        if anchored.is_match(example) {
            return regex_scrubber(pattern, DATETIME_PLACEHOLDER);
        }
    }
    Err(ApprovalError::NoDatetimeScrubberFound {
        example: example.to_string(),
    })
}

fn compile(pattern: &str) -> ApprovalResult<Regex> {
    Regex::new(pattern).map_err(|source| ApprovalError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
