//! End-of-run removal of approved files no test referenced.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use frankenapproval_core::error::ApprovalResult;
use frankenapproval_core::naming::is_approved_file_name;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into.
pub const SKIPPED_DIRS: [&str; 3] = [".git", "target", "node_modules"];

/// Which tests the finished run covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScope {
    /// Every test in the suite ran in this process.
    FullSuite,
    /// A filtered subset ran; the ledger is incomplete.
    Partial,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Approved files deleted because nothing referenced them.
    pub deleted: Vec<PathBuf>,
    /// Approved files found in the ledger and kept.
    pub kept: usize,
    /// True when the sweep did not run at all.
    pub skipped: bool,
}

impl SweepReport {
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Delete every approved file under `root` that is not in `used`.
///
/// Files that do not follow the approved naming convention are never touched.
///
/// # Errors
///
/// Returns `ApprovalError::Io` if walking the tree or deleting a file fails.
#[instrument(name = "frankenapproval::sweep", skip_all, fields(root = %root.display()))]
pub fn sweep(root: &Path, used: &BTreeSet<PathBuf>) -> ApprovalResult<SweepReport> {
    let mut report = SweepReport::default();
    if !root.is_dir() {
        debug!("approvals directory does not exist; nothing to sweep");
        return Ok(report);
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_approved = entry
            .file_name()
            .to_str()
            .is_some_and(is_approved_file_name);
        if !is_approved {
            continue;
        }
        if used.contains(entry.path()) {
            report.kept += 1;
            continue;
        }
        fs::remove_file(entry.path())?;
        info!(path = %entry.path().display(), "deleted unused approved file");
        report.deleted.push(entry.path().to_path_buf());
    }

    info!(
        deleted_count = report.deleted.len(),
        kept = report.kept,
        "sweep finished"
    );
    Ok(report)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}
