//! The write, compare, report, re-compare cycle.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use frankenapproval_core::content::{ContentFormat, Payload};
use frankenapproval_core::error::{ApprovalError, ApprovalResult};
use frankenapproval_core::naming::ArtifactPair;
use frankenapproval_core::scrub::Scrubber;
use frankenapproval_core::write::{approve, discard_placeholder, discard_received, write_artifacts};
use frankenapproval_report::invoker::{ReportOutcome, ReporterInvoker};
use tracing::{debug, info, warn};

/// Per-call switches for one verification.
#[derive(Clone, Default)]
pub struct VerifyOptions {
    /// Launch the reporter even when the artifacts already match.
    pub report_always: bool,
    /// Never launch the reporter; a mismatch is a plain rejection.
    pub report_suppress: bool,
    /// Copy received over approved before comparing.
    pub auto_approve: bool,
    /// Applied left to right to text payloads before writing.
    pub scrubbers: Vec<Scrubber>,
}

impl VerifyOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn report_always(mut self, enabled: bool) -> Self {
        self.report_always = enabled;
        self
    }

    #[must_use]
    pub const fn report_suppress(mut self, enabled: bool) -> Self {
        self.report_suppress = enabled;
        self
    }

    #[must_use]
    pub const fn auto_approve(mut self, enabled: bool) -> Self {
        self.auto_approve = enabled;
        self
    }

    #[must_use]
    pub fn scrub(mut self, scrubber: Scrubber) -> Self {
        self.scrubbers.push(scrubber);
        self
    }

    #[must_use]
    pub fn scrub_with(mut self, scrubber: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.scrubbers.push(Arc::new(scrubber));
        self
    }
}

impl fmt::Debug for VerifyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyOptions")
            .field("report_always", &self.report_always)
            .field("report_suppress", &self.report_suppress)
            .field("auto_approve", &self.auto_approve)
            .field("scrubbers", &self.scrubbers.len())
            .finish()
    }
}

/// A mismatch that survived reporting. The received file is left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub received: PathBuf,
    pub approved: PathBuf,
    /// Reporter that reported differences, if any ran decisively.
    pub reporter: Option<String>,
    /// Reporter output, typically a unified diff.
    pub diagnostic: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Received is different from approved.")?;
        writeln!(
            f,
            "To approve run mv --force {} {}",
            self.received.display(),
            self.approved.display()
        )?;
        f.write_str(&self.diagnostic)
    }
}

/// Terminal state of one verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(Rejection),
}

impl Verdict {
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Approved => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Drive one verification for an already resolved pair.
///
/// # Errors
///
/// - `NoApproverAvailable` when the artifacts differ and no reporter was
///   decisive. An unfilled placeholder is removed first.
/// - `Comparison` or `Io` on filesystem failures.
pub fn run_verification(
    pair: &ArtifactPair,
    payload: Payload<'_>,
    format: &ContentFormat,
    invoker: &ReporterInvoker,
    options: &VerifyOptions,
) -> ApprovalResult<Verdict> {
    write_artifacts(pair, payload, format, &options.scrubbers)?;

    if options.auto_approve {
        approve(pair)?;
        debug!(approved = %pair.approved.display(), "auto-approved received content");
    }

    let matched = format.comparator.equal(&pair.received, &pair.approved)?;
    if matched && !options.report_always {
        discard_received(pair)?;
        debug!(approved = %pair.approved.display(), "received matches approved");
        return Ok(Verdict::Approved);
    }

    let mut rejected_by = None;
    let mut diagnostic = String::new();
    if !options.report_suppress {
        match invoker.report(&pair.received, &pair.approved, format.kind) {
            ReportOutcome::Resolved { reporter } => {
                debug!(%reporter, "reporter resolved; re-comparing");
            }
            ReportOutcome::Rejected {
                reporter,
                diagnostic: output,
            } => {
                rejected_by = Some(reporter);
                diagnostic = output;
            }
            ReportOutcome::NoToolAvailable { attempted } => {
                if !matched {
                    discard_placeholder(pair, format)?;
                }
                return Err(ApprovalError::NoApproverAvailable {
                    received: pair.received.clone(),
                    approved: pair.approved.clone(),
                    attempted,
                });
            }
        }
    }

    if format.comparator.equal(&pair.received, &pair.approved)? {
        discard_received(pair)?;
        info!(approved = %pair.approved.display(), "received approved after review");
        return Ok(Verdict::Approved);
    }

    let removed_placeholder = discard_placeholder(pair, format)?;
    warn!(
        received = %pair.received.display(),
        approved = %pair.approved.display(),
        reporter = rejected_by.as_deref().unwrap_or("none"),
        removed_placeholder,
        "received is different from approved"
    );
    Ok(Verdict::Rejected(Rejection {
        received: pair.received.clone(),
        approved: pair.approved.clone(),
        reporter: rejected_by,
        diagnostic,
    }))
}
