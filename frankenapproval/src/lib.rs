//! # frankenapproval
//!
//! Approval testing for Rust: a test asserts that its output equals a
//! previously accepted reference artifact.
//!
//! Every verification writes a *received* file next to an *approved* file
//! derived from the running test's identity. If the two match, the received
//! file is deleted and the test passes. If they differ, a reporter (a diff
//! viewer, an IDE, or plain `diff`) is launched so a human can reconcile them;
//! the pair is then compared again. Approved files live with the test suite and
//! change only through that review, through auto-approve mode, or through the
//! end-of-run sweep of files no test referenced.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use frankenapproval::prelude::*;
//!
//! #[test]
//! fn renders_greeting() {
//!     assert_approved!("Hello World!");
//!     assert!(frankenapproval::verify_json(&serde_json::json!({"b": 100, "a": null}), true).unwrap());
//! }
//! ```
//!
//! The test is identified by its libtest thread name qualified with the test
//! target (`render::renders_greeting` for `tests/render.rs`), or by
//! `FRANKENAPPROVAL_CURRENT_TEST` when set. The first run writes
//! `render--renders_greeting.received.txt`, finds no approved file, and opens a
//! reporter. Once `render--renders_greeting.approved.txt` holds the accepted
//! content, later runs pass silently.
//!
//! # Architecture
//!
//! | Crate | Role |
//! |-------|------|
//! | `frankenapproval-core` | errors, config, identity, naming, run registry, content kinds, writer, comparator, scrubbers |
//! | `frankenapproval-report` | reporter table, exit-code protocol, command runner, invoker |
//! | `frankenapproval-engine` | `ApprovalSession`, verification cycle, JSON encoder, cleanup sweeper |
//!
//! # Configuration
//!
//! ```toml
//! [package.metadata.frankenapproval]
//! approved-dir = "tests/approved"
//! auto-approve = false
//! clean-unused = true
//! ```
//!
//! `FRANKENAPPROVAL_APPROVED_DIR`, `FRANKENAPPROVAL_AUTO_APPROVE`, and
//! `FRANKENAPPROVAL_CLEAN_UNUSED` override the manifest. Setting `CI` restricts
//! reporting to headless `diff`.

use std::sync::OnceLock;

use serde::Serialize;
use tracing::debug;

pub use frankenapproval_core::{
    ApprovalConfig, ApprovalError, ApprovalResult, ArtifactPair, CallIdentity, ChainedIdentity,
    Comparator, ContentFormat, ContentKind, ContentRegistry, EnvIdentity, ExactComparator,
    FixedIdentity, IdentitySource, NameResolver, ReporterEntry, RunOverrides, RunRegistry,
    Scrubber, ThreadNameIdentity, datetime_scrubber, regex_scrubber, uuid_scrubber,
};
pub use frankenapproval_engine::{
    ApprovalSession, ApprovalSessionBuilder, JSON_EXTENSION, Rejection, RunScope, SweepReport,
    TEXT_EXTENSION, Verdict, VerifyOptions,
};
pub use frankenapproval_report::{
    CommandOutput, CommandRunner, ExitDisposition, ReportOutcome, ReporterDescriptor,
    ReporterInvoker, ScriptedCommandRunner, ScriptedResponse, SystemCommandRunner,
};

#[cfg(feature = "subscriber")]
pub mod tracing_setup;

/// Commonly used types and the assertion macro.
pub mod prelude {
    pub use crate::assert_approved;
    pub use crate::{
        ApprovalError, ApprovalResult, ApprovalSession, RunScope, Verdict, VerifyOptions,
        datetime_scrubber, regex_scrubber, uuid_scrubber,
    };
}

static SESSION: OnceLock<ApprovalSession> = OnceLock::new();

/// The process-wide session, created from the environment on first use.
///
/// # Errors
///
/// Propagates configuration failures from [`ApprovalSession::from_environment`].
pub fn session() -> ApprovalResult<&'static ApprovalSession> {
    if let Some(session) = SESSION.get() {
        return Ok(session);
    }
    let created = ApprovalSession::from_environment()?;
    if SESSION.set(created).is_err() {
        debug!("another thread installed the process-wide session first");
    }
    SESSION.get().ok_or(ApprovalError::StatePoisoned)
}

/// Install a custom process-wide session before the first verification.
///
/// # Errors
///
/// Hands the session back if one is already installed.
pub fn install_session(session: ApprovalSession) -> Result<(), ApprovalSession> {
    SESSION.set(session)
}

/// Verify text as `.txt` with the process-wide session.
///
/// # Errors
///
/// Configuration errors, `NoApproverAvailable`, and I/O failures.
pub fn verify(text: &str) -> ApprovalResult<bool> {
    verify_as(text, TEXT_EXTENSION)
}

/// Verify text under a custom extension.
///
/// # Errors
///
/// See [`verify`].
pub fn verify_as(text: &str, extension: &str) -> ApprovalResult<bool> {
    Ok(session()?.verify(text, extension)?.is_approved())
}

/// Verify bytes against a binary-registered extension (`.png`, `.jpg`, `.jpeg` by default).
///
/// # Errors
///
/// `UnsupportedExtension` for unregistered extensions, otherwise as [`verify`].
pub fn verify_binary(bytes: &[u8], extension: &str) -> ApprovalResult<bool> {
    Ok(session()?.verify_binary(bytes, extension)?.is_approved())
}

/// Verify a `Serialize` value as pretty JSON, optionally sorting keys.
///
/// # Errors
///
/// `InvalidPayload` if the value has no JSON form, otherwise as [`verify`].
pub fn verify_json<T: Serialize + ?Sized>(value: &T, sort: bool) -> ApprovalResult<bool> {
    Ok(session()?.verify_json(value, sort)?.is_approved())
}

/// Verify JSON text, normalizing its layout first.
///
/// # Errors
///
/// `InvalidPayload` for malformed JSON, otherwise as [`verify`].
pub fn verify_json_str(text: &str, sort: bool) -> ApprovalResult<bool> {
    Ok(session()?.verify_json_str(text, sort)?.is_approved())
}

/// Finish the run on the process-wide session.
///
/// # Errors
///
/// I/O failures while sweeping.
pub fn finish_run(scope: RunScope) -> ApprovalResult<SweepReport> {
    session()?.finish(scope)
}

/// Verify text with the process-wide session and panic with the manual
/// approval instructions on mismatch.
#[macro_export]
macro_rules! assert_approved {
    ($text:expr) => {
        $crate::assert_approved!($text, $crate::TEXT_EXTENSION)
    };
    ($text:expr, $extension:expr) => {
        match $crate::session().and_then(|session| session.verify($text, $extension)) {
            Ok($crate::Verdict::Approved) => {}
            Ok($crate::Verdict::Rejected(rejection)) => panic!("{rejection}"),
            Err(error) => panic!("{error}"),
        }
    };
}
