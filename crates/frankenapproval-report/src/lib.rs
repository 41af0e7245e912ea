//! Reporter discovery and invocation for frankenapproval.
//!
//! When a received artifact differs from its approved counterpart, a reporter
//! (diff viewer, IDE, or plain `diff`) is launched so a human can reconcile
//! the two. This crate holds the descriptor table, the exit-code protocol
//! (`ExitDisposition`), the `CommandRunner` seam, and the `ReporterInvoker`.

pub mod descriptor;
pub mod exit;
pub mod invoker;

pub use descriptor::{ReporterDescriptor, builtin_reporters, reporter_table};
pub use exit::{COMMAND_NOT_FOUND_EXIT_CODE, DEFAULT_DIFFERENCES_EXIT_CODE, ExitDisposition};
pub use invoker::{
    CommandOutput, CommandRunner, ReportOutcome, ReporterInvoker, ScriptedCommandRunner,
    ScriptedResponse, SystemCommandRunner, is_ci,
};
