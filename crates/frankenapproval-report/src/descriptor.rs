//! Reporter descriptors and the built-in priority table.

use std::path::Path;

use frankenapproval_core::config::ReporterEntry;
use serde::{Deserialize, Serialize};

use crate::exit::DEFAULT_DIFFERENCES_EXIT_CODE;

pub const RECEIVED_PLACEHOLDER: &str = "%received";
pub const APPROVED_PLACEHOLDER: &str = "%approved";

/// A named reporter: ordered candidate commands plus capability flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterDescriptor {
    pub name: String,
    /// Candidate argument vectors, tried in order until one runs.
    pub commands: Vec<Vec<String>>,
    /// Whether the tool can present binary artifacts.
    pub binary: bool,
    pub differences_exit_code: i32,
}

impl ReporterDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, commands: Vec<Vec<String>>, binary: bool) -> Self {
        Self {
            name: name.into(),
            commands,
            binary,
            differences_exit_code: DEFAULT_DIFFERENCES_EXIT_CODE,
        }
    }

    #[must_use]
    pub const fn with_differences_exit_code(mut self, code: i32) -> Self {
        self.differences_exit_code = code;
        self
    }

    #[must_use]
    pub fn from_entry(entry: &ReporterEntry) -> Self {
        Self {
            name: entry.name.clone(),
            commands: entry.commands.clone(),
            binary: entry.binary,
            differences_exit_code: entry
                .differences_exit_code
                .unwrap_or(DEFAULT_DIFFERENCES_EXIT_CODE),
        }
    }

    /// Unified `diff`, the only reporter used in CI.
    #[must_use]
    pub fn headless_diff() -> Self {
        Self::new(
            "diff",
            vec![argv(&[
                "diff",
                "--unified",
                "--color",
                "--suppress-common-lines",
                "--label",
                "received",
                "--label",
                "approved",
                RECEIVED_PLACEHOLDER,
                APPROVED_PLACEHOLDER,
            ])],
            true,
        )
    }
}

/// Built-in reporters in priority order. `home` locates per-user launchers.
#[must_use]
pub fn builtin_reporters(home: Option<&Path>) -> Vec<ReporterDescriptor> {
    let mut rustrover = vec![argv(&[
        "rustrover",
        "diff",
        RECEIVED_PLACEHOLDER,
        APPROVED_PLACEHOLDER,
    ])];
    if let Some(home) = home {
        let toolbox = home.join(".local/share/JetBrains/Toolbox/scripts/rustrover");
        rustrover.push(vec![
            toolbox.to_string_lossy().into_owned(),
            "diff".into(),
            RECEIVED_PLACEHOLDER.into(),
            APPROVED_PLACEHOLDER.into(),
        ]);
    }
    rustrover.push(argv(&[
        "/usr/bin/open",
        "-W",
        "-n",
        "-a",
        "RustRover.app",
        "--args",
        "diff",
        RECEIVED_PLACEHOLDER,
        APPROVED_PLACEHOLDER,
    ]));

    let code_args = [
        "--new-window",
        "--wait",
        "--diff",
        RECEIVED_PLACEHOLDER,
        APPROVED_PLACEHOLDER,
    ];
    let code: Vec<Vec<String>> = ["code", "/usr/bin/code"]
        .into_iter()
        .map(|program| prepend(&[program], &code_args))
        .chain(std::iter::once(prepend(
            &[
                "/usr/bin/open",
                "-W",
                "-n",
                "-a",
                "/Applications/Visual Studio Code.app/Contents/Resources/app/bin/code",
                "--args",
            ],
            &code_args,
        )))
        .collect();

    vec![
        ReporterDescriptor::new(
            "meld",
            vec![argv(&["meld", RECEIVED_PLACEHOLDER, APPROVED_PLACEHOLDER])],
            false,
        ),
        ReporterDescriptor::new("rustrover", rustrover, true),
        ReporterDescriptor::new("code", code, true),
        ReporterDescriptor::headless_diff(),
    ]
}

/// Configured reporters first, then the built-ins.
#[must_use]
pub fn reporter_table(configured: &[ReporterEntry], home: Option<&Path>) -> Vec<ReporterDescriptor> {
    configured
        .iter()
        .map(ReporterDescriptor::from_entry)
        .chain(builtin_reporters(home))
        .collect()
}

/// Substitute the artifact paths into a command template.
#[must_use]
pub fn render_command(template: &[String], received: &Path, approved: &Path) -> Vec<String> {
    let received = received.to_string_lossy();
    let approved = approved.to_string_lossy();
    template
        .iter()
        .map(|arg| {
            arg.replace(RECEIVED_PLACEHOLDER, &received)
                .replace(APPROVED_PLACEHOLDER, &approved)
        })
        .collect()
}

/// Space-joined command line for logs and error messages.
#[must_use]
pub fn display_command(argv: &[String]) -> String {
    argv.join(" ")
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| (*part).to_string()).collect()
}

fn prepend(head: &[&str], tail: &[&str]) -> Vec<String> {
    head.iter().chain(tail).map(|part| (*part).to_string()).collect()
}
