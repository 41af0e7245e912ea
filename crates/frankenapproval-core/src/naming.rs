//! Deterministic received/approved path pairs derived from test identity.
//!
//! Layout: `<root>/<approved_dir>/<sanitized identity>[.<n>].{received,approved}<ext>`.
//! Parameter text is always replaced by its decimal CRC-32 so names stay
//! bounded and filesystem-safe no matter what the parameters contain.

use std::path::{Component, Path, PathBuf};

use crc32fast::Hasher as Crc32Hasher;
use tracing::trace;

use crate::error::{ApprovalError, ApprovalResult};
use crate::identity::CallIdentity;
use crate::registry::{RunRegistry, call_suffix};

pub const RECEIVED_INFIX: &str = ".received";
pub const APPROVED_INFIX: &str = ".approved";

/// Characters that are unsafe in file names on at least one major platform.
pub const HOSTILE_CHARS: [char; 12] = [
    ':', '*', '?', '<', '>', '|', '\\', '\t', '\n', '\r', '\x0b', '\x0c',
];

const SUBSTITUTE: char = '-';

/// The two artifact locations of one verification call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPair {
    pub received: PathBuf,
    pub approved: PathBuf,
}

impl ArtifactPair {
    /// Build a pair from a stem (`/dir/name[.n]`) and an extension (`.txt`).
    #[must_use]
    pub fn from_stem(stem: &Path, extension: &str) -> Self {
        let with_infix = |infix: &str| {
            let mut name = stem.as_os_str().to_os_string();
            name.push(infix);
            name.push(extension);
            PathBuf::from(name)
        };
        Self {
            received: with_infix(RECEIVED_INFIX),
            approved: with_infix(APPROVED_INFIX),
        }
    }
}

/// Maps call identities to artifact pairs under a fixed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameResolver {
    root: PathBuf,
    approved_dir: PathBuf,
}

impl NameResolver {
    /// `root` is made absolute; `approved_dir` is relative to it (empty for none).
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::Io` if the current directory is needed to make
    /// `root` absolute and cannot be read.
    pub fn new(root: impl AsRef<Path>, approved_dir: impl AsRef<Path>) -> ApprovalResult<Self> {
        Ok(Self {
            root: std::path::absolute(root.as_ref())?,
            approved_dir: approved_dir.as_ref().to_path_buf(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute approvals directory.
    #[must_use]
    pub fn approvals_dir(&self) -> PathBuf {
        if self.approved_dir.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.approved_dir)
        }
    }

    /// Absolute stem for `identity`, before the call suffix is applied.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::MissingTestIdentity` when the identity names no
    /// file, which would otherwise place artifacts beside the approvals dir.
    pub fn stem_for(&self, identity: &CallIdentity) -> ApprovalResult<PathBuf> {
        let mut name = sanitize(&identity.node().replace("::", "--"));
        if let Some(params) = identity.params() {
            name.push_str(&format!("[{}]", parameter_checksum(params)));
        }

        let segments: Vec<String> = Path::new(&name)
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some(SUBSTITUTE.to_string()),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
            })
            .collect();
        if segments.is_empty() {
            return Err(ApprovalError::MissingTestIdentity {
                hint: format!("identity {:?} names no test", identity.to_string()),
            });
        }

        let root_segments: Vec<String> = self
            .approved_dir
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        // Leading directories the identity shares with the approvals dir are
        // dropped; the file name itself is never consumed.
        let dir_count = segments.len().saturating_sub(1);
        let overlap = segments[..dir_count]
            .iter()
            .zip(&root_segments)
            .take_while(|(a, b)| a == b)
            .count();

        let mut stem = self.approvals_dir();
        for segment in &segments[overlap..] {
            stem.push(segment);
        }
        Ok(stem)
    }

    /// Resolve the next artifact pair for `identity`, advancing its call
    /// counter and recording the approved path as used.
    ///
    /// # Errors
    ///
    /// - `InvalidExtension` for malformed extensions.
    /// - `MissingTestIdentity` when the identity names no file.
    pub fn resolve(
        &self,
        identity: &CallIdentity,
        extension: &str,
        registry: &mut RunRegistry,
    ) -> ApprovalResult<ArtifactPair> {
        validate_extension(extension)?;
        let base = self.stem_for(identity)?;
        let index = registry.next_call_index(&base);

        let mut stem = base.into_os_string();
        stem.push(call_suffix(index));
        let pair = ArtifactPair::from_stem(Path::new(&stem), extension);
        registry.record_used(pair.approved.clone());

        trace!(
            identity = %identity,
            call_index = index,
            approved = %pair.approved.display(),
            "resolved artifact pair"
        );
        Ok(pair)
    }
}

/// Replace every hostile character with `-`.
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if HOSTILE_CHARS.contains(&c) { SUBSTITUTE } else { c })
        .collect()
}

/// CRC-32 of the parameter text's UTF-8 bytes.
#[must_use]
pub fn parameter_checksum(params: &str) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(params.as_bytes());
    hasher.finalize()
}

/// Extensions must look like `.ext`: a leading dot and no separators or hostile characters.
///
/// # Errors
///
/// Returns `ApprovalError::InvalidExtension` describing the first violation.
pub fn validate_extension(extension: &str) -> ApprovalResult<()> {
    let invalid = |reason: &str| ApprovalError::InvalidExtension {
        extension: extension.to_string(),
        reason: reason.to_string(),
    };

    let Some(rest) = extension.strip_prefix('.') else {
        return Err(invalid("must start with '.'"));
    };
    if rest.is_empty() {
        return Err(invalid("must name a suffix after the '.'"));
    }
    if rest
        .chars()
        .any(|c| c == '/' || c.is_whitespace() || HOSTILE_CHARS.contains(&c))
    {
        return Err(invalid("must not contain separators, whitespace, or reserved characters"));
    }
    Ok(())
}

/// Whether `file_name` follows the `<stem>.approved<ext>` convention.
#[must_use]
pub fn is_approved_file_name(file_name: &str) -> bool {
    file_name
        .rfind(APPROVED_INFIX)
        .is_some_and(|idx| idx > 0 && file_name[idx + APPROVED_INFIX.len()..].starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> NameResolver {
        NameResolver::new("/work", "").expect("resolver")
    }

    fn file_names(pair: &ArtifactPair) -> (String, String) {
        (
            pair.received
                .file_name()
                .expect("received name")
                .to_string_lossy()
                .into_owned(),
            pair.approved
                .file_name()
                .expect("approved name")
                .to_string_lossy()
                .into_owned(),
        )
    }

    #[test]
    fn name_from_identity() {
        let mut registry = RunRegistry::new();
        let identity = CallIdentity::parse("naming_cases.rs::test_name (call)");
        let pair = resolver()
            .resolve(&identity, ".txt", &mut registry)
            .expect("resolve");
        let (received, approved) = file_names(&pair);
        assert_eq!(received, "naming_cases.rs--test_name.received.txt");
        assert_eq!(approved, "naming_cases.rs--test_name.approved.txt");
        assert_eq!(pair.received.parent(), pair.approved.parent());
        assert!(pair.received.is_absolute());
    }

    #[test]
    fn repeated_calls_are_numbered() {
        let mut registry = RunRegistry::new();
        let identity = CallIdentity::parse("naming_cases.rs::test_two_calls (call)");
        let resolver = resolver();

        let first = resolver.resolve(&identity, ".txt", &mut registry).expect("first");
        let second = resolver.resolve(&identity, ".txt", &mut registry).expect("second");
        let third = resolver.resolve(&identity, ".txt", &mut registry).expect("third");

        assert_eq!(file_names(&first).0, "naming_cases.rs--test_two_calls.received.txt");
        assert_eq!(file_names(&second).0, "naming_cases.rs--test_two_calls.2.received.txt");
        assert_eq!(file_names(&third).1, "naming_cases.rs--test_two_calls.3.approved.txt");
    }

    #[test]
    fn resolution_is_deterministic_for_fresh_registries() {
        let identity = CallIdentity::parse("suite::case[alpha]");
        let a = resolver()
            .resolve(&identity, ".txt", &mut RunRegistry::new())
            .expect("a");
        let b = resolver()
            .resolve(&identity, ".txt", &mut RunRegistry::new())
            .expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn long_parameters_are_replaced_by_checksum() {
        let mut registry = RunRegistry::new();
        let raw = format!(
            "naming_cases.rs::test_name_with_too_long_parameter_name[{}] (call)",
            "a".repeat(256)
        );
        let pair = resolver()
            .resolve(&CallIdentity::parse(&raw), ".txt", &mut registry)
            .expect("resolve");
        assert_eq!(
            file_names(&pair).0,
            "naming_cases.rs--test_name_with_too_long_parameter_name[2960995929].received.txt"
        );
    }

    #[test]
    fn parameter_checksum_is_stable_and_discriminating() {
        let long_a = "x".repeat(400);
        let long_b = format!("{}y", "x".repeat(399));
        assert_eq!(parameter_checksum(&long_a), parameter_checksum(&long_a.clone()));
        assert_ne!(parameter_checksum(&long_a), parameter_checksum(&long_b));

        let stem_a = resolver().stem_for(&CallIdentity::parse(&format!("m::t[{long_a}]"))).expect("stem");
        let stem_b = resolver().stem_for(&CallIdentity::parse(&format!("m::t[{long_b}]"))).expect("stem");
        assert_ne!(stem_a, stem_b);
    }

    #[test]
    fn short_parameters_are_hashed_too() {
        let stem = resolver().stem_for(&CallIdentity::parse("m::t[a/b:c]")).expect("stem");
        let name = stem.file_name().expect("name").to_string_lossy().into_owned();
        assert_eq!(name, format!("m--t[{}]", parameter_checksum("a/b:c")));
    }

    #[test]
    fn hostile_characters_are_replaced() {
        assert_eq!(sanitize("a:b*c?d<e>f|g\\h\ti\nj\rk\x0bl\x0cm"), "a-b-c-d-e-f-g-h-i-j-k-l-m");
        let stem = resolver().stem_for(&CallIdentity::parse("mod::weird*name?")).expect("stem");
        assert_eq!(stem, Path::new("/work/mod--weird-name-"));
    }

    #[test]
    fn approvals_dir_overlap_is_not_doubled() {
        let resolver = NameResolver::new("/work", "tests/approved").expect("resolver");
        let stem = resolver.stem_for(&CallIdentity::parse("tests/lifecycle.rs::test_b (call)")).expect("stem");
        assert_eq!(stem, Path::new("/work/tests/approved/lifecycle.rs--test_b"));

        let resolver = NameResolver::new("/work", "tests").expect("resolver");
        let stem = resolver.stem_for(&CallIdentity::parse("tests/lifecycle.rs::test_b")).expect("stem");
        assert_eq!(stem, Path::new("/work/tests/lifecycle.rs--test_b"));
    }

    #[test]
    fn rust_paths_stay_in_approvals_dir() {
        let resolver = NameResolver::new("/work", "approved").expect("resolver");
        let stem = resolver.stem_for(&CallIdentity::parse("verify::tests::round_trip")).expect("stem");
        assert_eq!(stem, Path::new("/work/approved/verify--tests--round_trip"));
    }

    #[test]
    fn parent_components_cannot_escape_the_root() {
        let stem = resolver().stem_for(&CallIdentity::parse("../../etc/passwd::case")).expect("stem");
        assert!(stem.starts_with("/work"));
        assert!(!stem.components().any(|c| c == Component::ParentDir));
    }

    #[test]
    fn identity_without_a_name_never_leaves_the_approvals_dir() {
        let resolver = NameResolver::new("/work/approved", "").expect("resolver");
        for raw in [" (call)", "/", "."] {
            let mut registry = RunRegistry::new();
            let err = resolver
                .resolve(&CallIdentity::parse(raw), ".txt", &mut registry)
                .expect_err(raw);
            assert!(err.is_configuration_error(), "{raw:?}");
            assert!(registry.used_files().is_empty());
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_roots_are_kept_byte_for_byte() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new(OsStr::from_bytes(b"/work/caf\xe9"));
        let pair = ArtifactPair::from_stem(&root.join("m--t"), ".txt");
        assert!(pair.approved.starts_with(root));
        assert_eq!(
            pair.received.as_os_str().as_bytes(),
            b"/work/caf\xe9/m--t.received.txt"
        );
    }

    #[test]
    fn approved_path_is_recorded_in_ledger() {
        let mut registry = RunRegistry::new();
        let pair = resolver()
            .resolve(&CallIdentity::parse("m::t"), ".json", &mut registry)
            .expect("resolve");
        assert!(registry.is_used(&pair.approved));
        assert!(!registry.is_used(&pair.received));
    }

    #[test]
    fn extensions_are_validated() {
        assert!(validate_extension(".txt").is_ok());
        assert!(validate_extension(".tar.gz").is_ok());
        for bad in ["txt", ".", "", "./x", ". x", ".a:b"] {
            let err = validate_extension(bad).expect_err("must reject");
            assert!(err.is_configuration_error(), "{bad:?}");
        }
    }

    #[test]
    fn approved_file_convention() {
        assert!(is_approved_file_name("m--t.approved.txt"));
        assert!(is_approved_file_name("m--t.2.approved.png"));
        assert!(!is_approved_file_name("m--t.received.txt"));
        assert!(!is_approved_file_name(".approved.txt"));
        assert!(!is_approved_file_name("notes.approvedx"));
        assert!(!is_approved_file_name("README.md"));
    }
}
