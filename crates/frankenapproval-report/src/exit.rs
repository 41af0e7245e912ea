//! Exit-code protocol between the invoker and external reporter tools.

use serde::{Deserialize, Serialize};

/// Shell convention for "command not found".
pub const COMMAND_NOT_FOUND_EXIT_CODE: i32 = 127;

/// Exit code diff-style tools use to signal "files differ".
pub const DEFAULT_DIFFERENCES_EXIT_CODE: i32 = 1;

/// What a finished (or unstartable) reporter process means for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitDisposition {
    /// Exit 0: the tool (or the human behind it) accepted the received content.
    Approved,
    /// The tool's differences code: a decisive rejection.
    DifferencesFound,
    /// Exit 127 or spawn failure: try the next candidate.
    CommandNotFound,
    /// Any other outcome, including death by signal: try the next candidate.
    Undecided,
}

impl ExitDisposition {
    /// Classify an exit status. `None` means the process ended without a code.
    #[must_use]
    pub const fn classify(exit_code: Option<i32>, differences_exit_code: i32) -> Self {
        match exit_code {
            Some(0) => Self::Approved,
            Some(COMMAND_NOT_FOUND_EXIT_CODE) => Self::CommandNotFound,
            Some(code) if code == differences_exit_code => Self::DifferencesFound,
            _ => Self::Undecided,
        }
    }

    /// Whether this outcome ends the reporter search.
    #[must_use]
    pub const fn is_decisive(self) -> bool {
        matches!(self, Self::Approved | Self::DifferencesFound)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::DifferencesFound => "differences_found",
            Self::CommandNotFound => "command_not_found",
            Self::Undecided => "undecided",
        }
    }
}
