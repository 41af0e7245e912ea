use std::path::PathBuf;

/// Unified error type covering every failure mode of an approval verification.
///
/// Every variant carries an actionable message. A content mismatch is never an
/// error: it surfaces as a rejected verdict. Only environment problems (no test
/// identity, no working diff tool, unreadable files) end up here.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    // === Configuration errors ===
    /// Verification was invoked outside a running test.
    #[error(
        "No test identity available ({hint}). Run inside a test, or set FRANKENAPPROVAL_CURRENT_TEST."
    )]
    MissingTestIdentity {
        /// Which identity sources were consulted.
        hint: String,
    },

    /// The extension is malformed or registered for a different content kind.
    #[error("Invalid extension \"{extension}\": {reason}")]
    InvalidExtension {
        /// The offending extension.
        extension: String,
        /// Why it was refused.
        reason: String,
    },

    /// A configuration value is invalid.
    #[error("Invalid config: {field} = \"{value}\": {reason}")]
    InvalidConfig {
        /// Which config field.
        field: String,
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    /// Binary verification for an extension without a registered placeholder.
    #[error(
        "Extension \"{extension}\" not supported. Extension for binary verification must be one of: {}",
        allowed.join(", ")
    )]
    UnsupportedExtension {
        /// The requested extension.
        extension: String,
        /// Extensions registered as binary.
        allowed: Vec<String>,
    },

    // === Reporter errors ===
    /// Every candidate reporter command failed to run or was not decisive.
    #[error(
        "No working approver could be found for {received} (tried: {}). Install a diff tool or configure reporters.",
        attempted.join("; ")
    )]
    NoApproverAvailable {
        /// Received artifact left behind for inspection.
        received: PathBuf,
        /// Approved artifact the reporter was asked to reconcile.
        approved: PathBuf,
        /// Rendered command lines that were attempted, in order.
        attempted: Vec<String>,
    },

    // === Comparison errors ===
    /// Reading one side of the artifact pair failed.
    #[error("Failed to compare {received} with {approved}: {source}")]
    Comparison {
        /// Received artifact.
        received: PathBuf,
        /// Approved artifact.
        approved: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    // === Payload errors ===
    /// The payload could not be encoded for verification.
    #[error("Invalid payload for {encoder}: {reason}")]
    InvalidPayload {
        /// Which encoder refused the payload.
        encoder: &'static str,
        /// What went wrong.
        reason: String,
    },

    // === Scrubber errors ===
    /// A scrub pattern failed to compile.
    #[error("Invalid scrub pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern text.
        pattern: String,
        /// The compile error.
        #[source]
        source: regex::Error,
    },

    /// No known date/time layout matches the example handed to the scrubber factory.
    #[error("No datetime scrubber found for example {example:?}. Pass a literal timestamp as printed.")]
    NoDatetimeScrubberFound {
        /// The example that matched nothing.
        example: String,
    },

    // === Run state ===
    /// The run registry lock was poisoned by a panicking test thread.
    #[error("Approval run state poisoned by a panicking thread; rerun the suite.")]
    StatePoisoned,

    // === I/O errors ===
    /// Wraps `std::io::Error` for file operations.
    #[error("I/O error: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),
}

impl ApprovalError {
    /// Whether this error belongs to the configuration class (fatal, caller misuse).
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingTestIdentity { .. }
                | Self::InvalidExtension { .. }
                | Self::InvalidConfig { .. }
                | Self::UnsupportedExtension { .. }
        )
    }
}

/// Convenience alias used throughout the frankenapproval crates.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
