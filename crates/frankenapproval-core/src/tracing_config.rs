//! Tracing conventions shared by every frankenapproval crate.
//!
//! The library never installs a subscriber on its own. Harness binaries that
//! want output can enable the facade's `subscriber` feature, or bring their
//! own subscriber and filter on [`TARGET_PREFIX`]:
//!
//! ```text
//! RUST_LOG=frankenapproval=debug cargo test
//! ```

use tracing::Level;

/// Target prefix used by all frankenapproval spans and events.
pub const TARGET_PREFIX: &str = "frankenapproval";

/// Environment variable consulted by [`level_from_env`].
pub const LOG_LEVEL_ENV: &str = "FRANKENAPPROVAL_LOG_LEVEL";

/// Span names used across the verification cycle.
pub mod span_names {
    /// Root span for one verification call.
    pub const VERIFY: &str = "frankenapproval::verify";
    /// Name resolution for an artifact pair.
    pub const RESOLVE: &str = "frankenapproval::resolve";
    /// Reporter invocation.
    pub const REPORT: &str = "frankenapproval::report";
    /// End-of-run cleanup sweep.
    pub const SWEEP: &str = "frankenapproval::sweep";
}

/// Structured field names used in tracing events.
pub mod field_names {
    pub const RECEIVED: &str = "received";
    pub const APPROVED: &str = "approved";
    pub const EXTENSION: &str = "extension";
    pub const REPORTER: &str = "reporter";
    pub const EXIT_CODE: &str = "exit_code";
    pub const CALL_INDEX: &str = "call_index";
    pub const DELETED_COUNT: &str = "deleted_count";
}

/// Parse a log level string (case-insensitive).
///
/// Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Level requested via `FRANKENAPPROVAL_LOG_LEVEL`, or `default`.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(default)
}
