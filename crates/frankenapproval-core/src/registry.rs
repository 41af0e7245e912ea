//! Run-scoped bookkeeping: per-stem call counters and the used-files ledger.
//!
//! One registry lives inside each session and is reset only by creating a new
//! session. Counters are monotonic per stem; the ledger is append-only.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone)]
pub struct RunRegistry {
    counters: HashMap<PathBuf, u32>,
    used: BTreeSet<PathBuf>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the counter for `stem` and return the 1-based call index.
    pub fn next_call_index(&mut self, stem: &Path) -> u32 {
        let count = self.counters.entry(stem.to_path_buf()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Number of names produced so far for `stem`.
    #[must_use]
    pub fn call_count(&self, stem: &Path) -> u32 {
        self.counters.get(stem).copied().unwrap_or(0)
    }

    pub fn record_used(&mut self, approved: PathBuf) {
        self.used.insert(approved);
    }

    #[must_use]
    pub fn is_used(&self, approved: &Path) -> bool {
        self.used.contains(approved)
    }

    #[must_use]
    pub fn used_files(&self) -> &BTreeSet<PathBuf> {
        &self.used
    }
}

/// Stem suffix for a 1-based call index: empty for the first call, `.n` after.
#[must_use]
pub fn call_suffix(index: u32) -> String {
    if index <= 1 {
        String::new()
    } else {
        format!(".{index}")
    }
}
