//! Verification engine for frankenapproval.
//!
//! [`ApprovalSession`] is the run-scoped context: it resolves artifact names,
//! drives the write/compare/report/re-compare cycle, and sweeps unreferenced
//! approved files when a full-suite run finishes.

pub mod json;
pub mod session;
pub mod sweep;
pub mod verify;

pub use json::{JSON_EXTENSION, render_json, render_json_str};
pub use session::{ApprovalSession, ApprovalSessionBuilder, TEXT_EXTENSION};
pub use sweep::{RunScope, SKIPPED_DIRS, SweepReport, sweep};
pub use verify::{Rejection, Verdict, VerifyOptions, run_verification};
