//! Identity of the currently executing test.
//!
//! The host harness announces the running test as
//! `path/to/module::test_name[params] (phase)`. Naming only ever sees the
//! parsed [`CallIdentity`]; where the raw string comes from is pluggable.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Environment variable carrying the fully qualified identity of the running test.
pub const CURRENT_TEST_ENV: &str = "FRANKENAPPROVAL_CURRENT_TEST";

const PHASE_MARKERS: [&str; 3] = [" (setup)", " (call)", " (teardown)"];

const CARGO_HASH_LEN: usize = 16;

/// A parsed test identity: node path plus optional parameter fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallIdentity {
    node: String,
    params: Option<String>,
}

impl CallIdentity {
    /// Parse a raw identity, stripping phase markers and splitting off the
    /// bracketed parameter segment that follows the test name.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut trimmed = raw.trim_end();
        for marker in PHASE_MARKERS {
            if let Some(stripped) = trimmed.strip_suffix(marker) {
                trimmed = stripped;
                break;
            }
        }

        // Brackets before the first `::` belong to the file path.
        let name_start = trimmed.find("::").map_or(0, |idx| idx + 2);
        if trimmed.ends_with(']')
            && let Some(open) = trimmed[name_start..].find('[')
        {
            let open = name_start + open;
            return Self {
                node: trimmed[..open].to_string(),
                params: Some(trimmed[open + 1..trimmed.len() - 1].to_string()),
            };
        }

        Self {
            node: trimmed.to_string(),
            params: None,
        }
    }

    /// Module path and test name, without parameters.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Raw parameter text between the brackets, if the test is parameterized.
    #[must_use]
    pub fn params(&self) -> Option<&str> {
        self.params.as_deref()
    }
}

impl fmt::Display for CallIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.params {
            Some(params) => write!(f, "{}[{params}]", self.node),
            None => f.write_str(&self.node),
        }
    }
}

/// Where the raw identity of the running test comes from.
pub trait IdentitySource: Send + Sync {
    /// Raw identity of the running test, or `None` outside a test.
    fn current(&self) -> Option<String>;

    /// Short label used in diagnostics when no identity is available.
    fn describe(&self) -> String;
}

/// Reads [`CURRENT_TEST_ENV`], from a snapshot or from the live process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvIdentity {
    snapshot: Option<HashMap<String, String>>,
}

impl EnvIdentity {
    /// Read the live process environment on every call.
    #[must_use]
    pub fn live() -> Self {
        Self { snapshot: None }
    }

    /// Read from a fixed environment snapshot.
    #[must_use]
    pub fn from_snapshot(env: HashMap<String, String>) -> Self {
        Self {
            snapshot: Some(env),
        }
    }
}

impl IdentitySource for EnvIdentity {
    fn current(&self) -> Option<String> {
        let value = match &self.snapshot {
            Some(env) => env.get(CURRENT_TEST_ENV).cloned(),
            None => std::env::var(CURRENT_TEST_ENV).ok(),
        };
        value.filter(|value| !value.trim().is_empty())
    }

    fn describe(&self) -> String {
        format!("env {CURRENT_TEST_ENV}")
    }
}

/// Uses the name of the current thread, qualified by the test target.
///
/// libtest names each test thread after its module path inside one test
/// binary, so `check` in `tests/a.rs` and `check` in `tests/b.rs` share a
/// thread name. The target (`a`, `b`, or the crate name for unit tests) is
/// prepended as a leading `::` segment to keep their artifacts apart.
#[derive(Debug, Clone, Default)]
pub struct ThreadNameIdentity {
    target: Option<String>,
}

impl ThreadNameIdentity {
    /// Qualify with the target of the running test binary.
    #[must_use]
    pub fn for_current_target() -> Self {
        Self {
            target: std::env::current_exe()
                .ok()
                .as_deref()
                .and_then(target_name),
        }
    }

    #[must_use]
    pub fn with_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
        }
    }

    /// Bare thread name, for harnesses that run a single test binary.
    #[must_use]
    pub fn unqualified() -> Self {
        Self::default()
    }
}

impl IdentitySource for ThreadNameIdentity {
    fn current(&self) -> Option<String> {
        let thread = std::thread::current();
        let name = thread
            .name()
            .filter(|name| *name != "main" && !name.is_empty())?;
        Some(match &self.target {
            Some(target) => format!("{target}::{name}"),
            None => name.to_string(),
        })
    }

    fn describe(&self) -> String {
        match &self.target {
            Some(target) => format!("test thread name in {target}"),
            None => "test thread name".into(),
        }
    }
}

/// Test target of a cargo-built test binary: the file stem without the
/// `-<16 hex digits>` suffix cargo appends.
#[must_use]
pub fn target_name(exe: &Path) -> Option<String> {
    let stem = exe.file_stem()?.to_str()?;
    let name = match stem.rsplit_once('-') {
        Some((name, hash))
            if !name.is_empty()
                && hash.len() == CARGO_HASH_LEN
                && hash.bytes().all(|byte| byte.is_ascii_hexdigit()) =>
        {
            name
        }
        _ => stem,
    };
    (!name.is_empty()).then(|| name.to_string())
}

/// A fixed identity, for harnesses that know the test name up front.
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub String);

impl IdentitySource for FixedIdentity {
    fn current(&self) -> Option<String> {
        Some(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("fixed {:?}", self.0)
    }
}

/// First source that answers wins.
pub struct ChainedIdentity {
    sources: Vec<Box<dyn IdentitySource>>,
}

impl ChainedIdentity {
    #[must_use]
    pub fn new(sources: Vec<Box<dyn IdentitySource>>) -> Self {
        Self { sources }
    }
}

impl Default for ChainedIdentity {
    /// Environment variable first, then the target-qualified libtest thread name.
    fn default() -> Self {
        Self::new(vec![
            Box::new(EnvIdentity::live()),
            Box::new(ThreadNameIdentity::for_current_target()),
        ])
    }
}

impl fmt::Debug for ChainedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedIdentity")
            .field("sources", &self.describe())
            .finish()
    }
}

impl IdentitySource for ChainedIdentity {
    fn current(&self) -> Option<String> {
        self.sources.iter().find_map(|source| source.current())
    }

    fn describe(&self) -> String {
        self.sources
            .iter()
            .map(|source| source.describe())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
