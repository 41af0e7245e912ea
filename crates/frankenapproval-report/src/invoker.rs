//! Reporter invocation: pick candidates, run them, interpret exit codes.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::hash::BuildHasher;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use frankenapproval_core::content::ContentKind;
use tracing::{debug, info, instrument, warn};

use crate::descriptor::{
    ReporterDescriptor, builtin_reporters, display_command, render_command,
};
use crate::exit::{COMMAND_NOT_FOUND_EXIT_CODE, ExitDisposition};

/// Environment variable whose presence selects headless CI reporting.
pub const CI_ENV: &str = "CI";

/// Whether `env` describes a continuous-integration run.
#[must_use]
pub fn is_ci<S: BuildHasher>(env: &HashMap<String, String, S>) -> bool {
    env.contains_key(CI_ENV)
}

/// Captured result of one finished child process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a reporter command to completion.
///
/// A spawn failure is an `Err`; a non-zero exit is an `Ok` with that code.
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Returns the spawn error when the program cannot be started.
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput>;
}

/// Spawns real processes and blocks until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty reporter command"))?;
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Scripted behavior for one program in a [`ScriptedCommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    /// Exit with `code`, printing `stdout`.
    Exit { code: i32, stdout: String },
    /// Fail to spawn, as if the program were not installed.
    SpawnFailure,
    /// Copy the second-to-last argument over the last one and exit 0,
    /// like a human accepting the received side in a diff tool.
    AcceptReceived,
}

impl ScriptedResponse {
    #[must_use]
    pub fn exit(code: i32) -> Self {
        Self::Exit {
            code,
            stdout: String::new(),
        }
    }

    #[must_use]
    pub fn exit_with_output(code: i32, stdout: impl Into<String>) -> Self {
        Self::Exit {
            code,
            stdout: stdout.into(),
        }
    }
}

/// In-process stand-in for external tools; records every argv it receives.
///
/// Programs without a script fail to spawn.
#[derive(Debug, Default)]
pub struct ScriptedCommandRunner {
    script: HashMap<String, ScriptedResponse>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn respond(mut self, program: impl Into<String>, response: ScriptedResponse) -> Self {
        self.script.insert(program.into(), response);
        self
    }

    /// Every argv run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Programs (first argv element) run so far, in order.
    #[must_use]
    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|argv| argv.into_iter().next())
            .collect()
    }
}

impl CommandRunner for ScriptedCommandRunner {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(argv.to_vec());

        let program = argv.first().map(String::as_str).unwrap_or_default();
        match self.script.get(program) {
            Some(ScriptedResponse::Exit { code, stdout }) => Ok(CommandOutput {
                exit_code: Some(*code),
                stdout: stdout.clone(),
                stderr: String::new(),
            }),
            Some(ScriptedResponse::AcceptReceived) => {
                if let [.., received, approved] = argv {
                    fs::copy(received, approved)?;
                }
                Ok(CommandOutput {
                    exit_code: Some(0),
                    ..CommandOutput::default()
                })
            }
            Some(ScriptedResponse::SpawnFailure) | None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{program}: not scripted"),
            )),
        }
    }
}

/// Result of asking the reporters about a mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// A tool exited 0; the caller must re-compare to confirm.
    Resolved { reporter: String },
    /// A tool reported differences.
    Rejected { reporter: String, diagnostic: String },
    /// Every candidate failed to run or was not decisive.
    NoToolAvailable { attempted: Vec<String> },
}

/// Tries reporter candidates in priority order until one is decisive.
#[derive(Debug, Clone)]
pub struct ReporterInvoker {
    descriptors: Vec<ReporterDescriptor>,
    runner: Arc<dyn CommandRunner>,
    ci_mode: bool,
}

impl ReporterInvoker {
    #[must_use]
    pub fn new(
        descriptors: Vec<ReporterDescriptor>,
        runner: Arc<dyn CommandRunner>,
        ci_mode: bool,
    ) -> Self {
        Self {
            descriptors,
            runner,
            ci_mode,
        }
    }

    /// Built-in table on the real system, CI detection disabled.
    #[must_use]
    pub fn system(home: Option<&Path>) -> Self {
        Self::new(builtin_reporters(home), Arc::new(SystemCommandRunner), false)
    }

    #[must_use]
    pub const fn ci_mode(&self) -> bool {
        self.ci_mode
    }

    #[must_use]
    pub fn descriptors(&self) -> &[ReporterDescriptor] {
        &self.descriptors
    }

    /// Descriptors eligible for `kind`, in priority order.
    #[must_use]
    pub fn candidates(&self, kind: ContentKind) -> Vec<ReporterDescriptor> {
        if self.ci_mode {
            return vec![ReporterDescriptor::headless_diff()];
        }
        self.descriptors
            .iter()
            .filter(|descriptor| kind == ContentKind::Text || descriptor.binary)
            .cloned()
            .collect()
    }

    /// Run candidates until one approves or rejects.
    #[instrument(
        name = "frankenapproval::report",
        skip_all,
        fields(
            received = %received.display(),
            approved = %approved.display(),
            kind = %kind,
            ci_mode = self.ci_mode,
        )
    )]
    pub fn report(&self, received: &Path, approved: &Path, kind: ContentKind) -> ReportOutcome {
        let mut attempted = Vec::new();

        for descriptor in self.candidates(kind) {
            for template in &descriptor.commands {
                let argv = render_command(template, received, approved);
                let rendered = display_command(&argv);
                attempted.push(rendered.clone());

                let output = match self.runner.run(&argv) {
                    Ok(output) => output,
                    Err(error) => {
                        debug!(
                            reporter = %descriptor.name,
                            error = %error,
                            "Failed to run command `{rendered}` as approver."
                        );
                        continue;
                    }
                };

                let disposition =
                    ExitDisposition::classify(output.exit_code, descriptor.differences_exit_code);
                match disposition {
                    ExitDisposition::Approved => {
                        info!(reporter = %descriptor.name, "reporter approved received content");
                        return ReportOutcome::Resolved {
                            reporter: descriptor.name.clone(),
                        };
                    }
                    ExitDisposition::DifferencesFound => {
                        debug!(
                            reporter = %descriptor.name,
                            exit_code = descriptor.differences_exit_code,
                            "reporter found differences"
                        );
                        return ReportOutcome::Rejected {
                            reporter: descriptor.name.clone(),
                            diagnostic: output.stdout,
                        };
                    }
                    ExitDisposition::CommandNotFound => {
                        debug!(
                            reporter = %descriptor.name,
                            exit_code = COMMAND_NOT_FOUND_EXIT_CODE,
                            "Failed to run command `{rendered}` as approver."
                        );
                    }
                    ExitDisposition::Undecided => {
                        debug!(
                            reporter = %descriptor.name,
                            exit_code = ?output.exit_code,
                            stderr = %output.stderr.trim_end(),
                            "reporter could not decide; trying next candidate"
                        );
                    }
                }
            }
        }

        warn!(
            attempted = attempted.len(),
            "No working approver could be found."
        );
        ReportOutcome::NoToolAvailable { attempted }
    }
}
