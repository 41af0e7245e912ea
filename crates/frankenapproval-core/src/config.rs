//! Run configuration: discovery, layering, and validation.
//!
//! Configuration lives in a `[package.metadata.frankenapproval]` (or
//! `[workspace.metadata.frankenapproval]`) table of a `Cargo.toml` found by
//! walking up from the working directory. Absence is not an error; every
//! feature then defaults to off.
//!
//! Precedence is `overrides > env > file > defaults`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApprovalError, ApprovalResult};

/// Manifest file searched for while walking up from the start directory.
pub const CONFIG_FILE_NAME: &str = "Cargo.toml";

/// Name of the nested metadata table holding frankenapproval settings.
pub const METADATA_TABLE: &str = "frankenapproval";

pub const ENV_APPROVED_DIR: &str = "FRANKENAPPROVAL_APPROVED_DIR";
pub const ENV_AUTO_APPROVE: &str = "FRANKENAPPROVAL_AUTO_APPROVE";
pub const ENV_CLEAN_UNUSED: &str = "FRANKENAPPROVAL_CLEAN_UNUSED";

const PRECEDENCE: [ConfigSource; 4] = [
    ConfigSource::Overrides,
    ConfigSource::Env,
    ConfigSource::File,
    ConfigSource::Defaults,
];

const KNOWN_KEYS: [&str; 4] = ["approved-dir", "auto-approve", "clean-unused", "reporters"];

/// A reporter declared in configuration, prepended ahead of the built-in table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ReporterEntry {
    pub name: String,
    /// Candidate argument vectors using `%received` / `%approved` placeholders.
    pub commands: Vec<Vec<String>>,
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub differences_exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ApprovalConfig {
    /// Approvals directory, relative to the project root. Empty means the root itself.
    pub approved_dir: String,
    /// Copy received over approved before every comparison.
    pub auto_approve: bool,
    /// Delete unreferenced approved files at the end of a full-suite run.
    pub clean_unused: bool,
    pub reporters: Vec<ReporterEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
struct ApprovalConfigPatch {
    approved_dir: Option<String>,
    auto_approve: Option<bool>,
    clean_unused: Option<bool>,
    reporters: Option<Vec<ReporterEntry>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Overrides,
    Env,
    File,
    Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigWarning {
    pub reason_code: String,
    pub field: String,
    pub source: ConfigSource,
    pub message: String,
}

/// Explicit per-run switches, typically parsed from harness flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub approved_dir: Option<String>,
    pub auto_approve: Option<bool>,
    pub clean_unused: Option<bool>,
}

impl RunOverrides {
    #[must_use]
    pub fn used_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.approved_dir.is_some() {
            flags.push("--approved-dir".into());
        }
        if self.auto_approve.is_some() {
            flags.push("--auto-approve".into());
        }
        if self.clean_unused.is_some() {
            flags.push("--clean-unused".into());
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLoadResult {
    pub config: ApprovalConfig,
    /// Directory every artifact path is anchored at.
    pub project_root: PathBuf,
    pub source_precedence: [ConfigSource; 4],
    /// Manifest whose metadata table was applied, if any.
    pub config_file_used: Option<PathBuf>,
    pub override_flags_used: Vec<String>,
    pub env_keys_used: Vec<String>,
    pub warnings: Vec<ConfigWarning>,
}

impl ConfigLoadResult {
    /// Absolute approvals directory (`project_root` joined with `approved_dir`).
    #[must_use]
    pub fn approvals_dir(&self) -> PathBuf {
        if self.config.approved_dir.is_empty() {
            self.project_root.clone()
        } else {
            self.project_root.join(&self.config.approved_dir)
        }
    }
}

/// Result of walking up the directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDiscovery {
    /// First manifest carrying the metadata table, with its contents.
    pub manifest: Option<(PathBuf, String)>,
    /// Directory of the nearest manifest, with or without the table.
    pub nearest_manifest_dir: Option<PathBuf>,
}

/// Walk from `start` up to the filesystem root looking for a manifest that
/// carries the frankenapproval metadata table.
///
/// # Errors
///
/// Returns `ApprovalError::Io` if a present manifest cannot be read and
/// `ApprovalError::InvalidConfig` if it is not valid TOML.
pub fn discover(start: &Path) -> ApprovalResult<ConfigDiscovery> {
    let mut discovery = ConfigDiscovery::default();

    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if !candidate.is_file() {
            continue;
        }
        if discovery.nearest_manifest_dir.is_none() {
            discovery.nearest_manifest_dir = Some(dir.to_path_buf());
        }
        let contents = fs::read_to_string(&candidate)?;
        let value = parse_manifest(&contents)?;
        if metadata_table(&value).is_some() {
            debug!(manifest = %candidate.display(), "found frankenapproval configuration");
            discovery.manifest = Some((candidate, contents));
            return Ok(discovery);
        }
    }

    debug!(start = %start.display(), "no frankenapproval configuration found");
    Ok(discovery)
}

/// Discover and load configuration starting at `start_dir`.
///
/// # Errors
///
/// Propagates discovery failures and returns `ApprovalError::InvalidConfig`
/// for parse or validation failures.
pub fn load_from_sources<S>(
    start_dir: &Path,
    env: &HashMap<String, String, S>,
    overrides: &RunOverrides,
) -> ApprovalResult<ConfigLoadResult>
where
    S: BuildHasher,
{
    let discovery = discover(start_dir)?;
    let fallback_root = discovery
        .nearest_manifest_dir
        .clone()
        .unwrap_or_else(|| start_dir.to_path_buf());

    match &discovery.manifest {
        Some((path, contents)) => {
            load_from_str(Some(contents), Some(path), &fallback_root, env, overrides)
        }
        None => load_from_str(None, None, &fallback_root, env, overrides),
    }
}

/// Load configuration from raw manifest TOML plus env and override layers.
///
/// `fallback_root` becomes the project root when no manifest path is given.
///
/// # Errors
///
/// Returns `ApprovalError::InvalidConfig` when parsing or validation fails.
pub fn load_from_str<S>(
    manifest_toml: Option<&str>,
    manifest_path: Option<&Path>,
    fallback_root: &Path,
    env: &HashMap<String, String, S>,
    overrides: &RunOverrides,
) -> ApprovalResult<ConfigLoadResult>
where
    S: BuildHasher,
{
    let mut config = ApprovalConfig::default();
    let mut warnings = Vec::new();
    let mut config_file_used = None;

    if let Some(manifest_toml) = manifest_toml {
        let value = parse_manifest(manifest_toml)?;
        if let Some(table) = metadata_table(&value) {
            warnings.extend(collect_unknown_key_warnings(table));
            let patch: ApprovalConfigPatch =
                toml::Value::Table(table.clone())
                    .try_into()
                    .map_err(|error: toml::de::Error| ApprovalError::InvalidConfig {
                        field: METADATA_TABLE.into(),
                        value: "<toml>".into(),
                        reason: error.to_string(),
                    })?;
            apply_patch(&mut config, patch);
            config_file_used = manifest_path.map(Path::to_path_buf);
        }
    }

    let env_keys_used = apply_env_overrides(&mut config, env)?;
    apply_run_overrides(&mut config, overrides);
    validate_config(&mut config, &mut warnings)?;

    let project_root = manifest_path
        .and_then(Path::parent)
        .map_or_else(|| fallback_root.to_path_buf(), Path::to_path_buf);

    Ok(ConfigLoadResult {
        config,
        project_root,
        source_precedence: PRECEDENCE,
        config_file_used,
        override_flags_used: overrides.used_flags(),
        env_keys_used,
        warnings,
    })
}

pub fn emit_config_loaded(result: &ConfigLoadResult) {
    let reason_codes: Vec<&str> = result
        .warnings
        .iter()
        .map(|warning| warning.reason_code.as_str())
        .collect();
    info!(
        event = "config_loaded",
        precedence = ?result.source_precedence,
        project_root = %result.project_root.display(),
        config_file_used = ?result.config_file_used,
        override_flags_used = ?result.override_flags_used,
        env_keys_used = ?result.env_keys_used,
        reason_codes = ?reason_codes,
        "frankenapproval configuration loaded"
    );
}

fn parse_manifest(contents: &str) -> ApprovalResult<toml::Value> {
    toml::from_str(contents).map_err(|error| ApprovalError::InvalidConfig {
        field: CONFIG_FILE_NAME.into(),
        value: "<toml>".into(),
        reason: error.to_string(),
    })
}

fn metadata_table(manifest: &toml::Value) -> Option<&toml::Table> {
    ["package", "workspace"].into_iter().find_map(|section| {
        manifest
            .get(section)?
            .get("metadata")?
            .get(METADATA_TABLE)?
            .as_table()
    })
}

fn apply_patch(config: &mut ApprovalConfig, patch: ApprovalConfigPatch) {
    if let Some(approved_dir) = patch.approved_dir {
        config.approved_dir = approved_dir;
    }
    if let Some(auto_approve) = patch.auto_approve {
        config.auto_approve = auto_approve;
    }
    if let Some(clean_unused) = patch.clean_unused {
        config.clean_unused = clean_unused;
    }
    if let Some(reporters) = patch.reporters {
        config.reporters = reporters;
    }
}

fn apply_env_overrides(
    config: &mut ApprovalConfig,
    env: &HashMap<String, String, impl BuildHasher>,
) -> ApprovalResult<Vec<String>> {
    let mut keys_used = Vec::new();

    if let Some(value) = env.get(ENV_APPROVED_DIR) {
        config.approved_dir.clone_from(value);
        keys_used.push(ENV_APPROVED_DIR.into());
    }

    if let Some(value) = env.get(ENV_AUTO_APPROVE) {
        config.auto_approve = parse_bool(value, "auto-approve")?;
        keys_used.push(ENV_AUTO_APPROVE.into());
    }

    if let Some(value) = env.get(ENV_CLEAN_UNUSED) {
        config.clean_unused = parse_bool(value, "clean-unused")?;
        keys_used.push(ENV_CLEAN_UNUSED.into());
    }

    Ok(keys_used)
}

fn apply_run_overrides(config: &mut ApprovalConfig, overrides: &RunOverrides) {
    if let Some(approved_dir) = &overrides.approved_dir {
        config.approved_dir.clone_from(approved_dir);
    }
    if let Some(auto_approve) = overrides.auto_approve {
        config.auto_approve = auto_approve;
    }
    if let Some(clean_unused) = overrides.clean_unused {
        config.clean_unused = clean_unused;
    }
}

fn collect_unknown_key_warnings(table: &toml::Table) -> Vec<ConfigWarning> {
    let known: HashSet<&str> = KNOWN_KEYS.into_iter().collect();
    table
        .keys()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ConfigWarning {
            reason_code: "config.unknown_key.warning".into(),
            field: format!("{METADATA_TABLE}.{key}"),
            source: ConfigSource::File,
            message: format!("Unknown key {METADATA_TABLE}.{key} ignored"),
        })
        .collect()
}

fn validate_config(
    config: &mut ApprovalConfig,
    warnings: &mut Vec<ConfigWarning>,
) -> ApprovalResult<()> {
    let trimmed = config.approved_dir.trim().trim_end_matches(['/', '\\']);
    if Path::new(trimmed).is_absolute() || trimmed.starts_with('/') {
        return Err(ApprovalError::InvalidConfig {
            field: "approved-dir".into(),
            value: config.approved_dir.clone(),
            reason: "must be relative to the project root".into(),
        });
    }
    config.approved_dir = trimmed.to_string();

    for reporter in &config.reporters {
        if reporter.name.trim().is_empty() {
            return Err(ApprovalError::InvalidConfig {
                field: "reporters.name".into(),
                value: reporter.name.clone(),
                reason: "reporter name must not be empty".into(),
            });
        }
        if reporter.commands.is_empty() || reporter.commands.iter().any(Vec::is_empty) {
            return Err(ApprovalError::InvalidConfig {
                field: format!("reporters.{}.commands", reporter.name),
                value: format!("{:?}", reporter.commands),
                reason: "expected at least one non-empty argument vector".into(),
            });
        }
        for command in &reporter.commands {
            let mentions_both = command.iter().any(|arg| arg.contains("%received"))
                && command.iter().any(|arg| arg.contains("%approved"));
            if !mentions_both {
                warnings.push(ConfigWarning {
                    reason_code: "config.reporters.missing_placeholder".into(),
                    field: format!("reporters.{}.commands", reporter.name),
                    source: ConfigSource::File,
                    message: format!(
                        "Command {command:?} does not reference both %received and %approved"
                    ),
                });
            }
        }
    }

    Ok(())
}

fn parse_bool(value: &str, field: &str) -> ApprovalResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ApprovalError::InvalidConfig {
            field: field.into(),
            value: value.into(),
            reason: "expected boolean (true/false/1/0/yes/no/on/off)".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    use super::{ApprovalConfig, RunOverrides, discover, load_from_sources, load_from_str};
    use crate::error::ApprovalError;

    fn root() -> &'static Path {
        Path::new("/work/project")
    }

    #[test]
    fn missing_manifest_yields_defaults() {
        let result = load_from_str(None, None, root(), &HashMap::new(), &RunOverrides::default())
            .expect("load defaults");
        assert_eq!(result.config, ApprovalConfig::default());
        assert_eq!(result.project_root, root());
        assert_eq!(result.approvals_dir(), root());
        assert!(result.config_file_used.is_none());
    }

    #[test]
    fn manifest_without_table_yields_defaults() {
        let manifest = "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n";
        let result = load_from_str(
            Some(manifest),
            Some(Path::new("/work/project/Cargo.toml")),
            root(),
            &HashMap::new(),
            &RunOverrides::default(),
        )
        .expect("load");
        assert_eq!(result.config, ApprovalConfig::default());
        assert!(result.config_file_used.is_none());
    }

    #[test]
    fn package_metadata_table_is_applied() {
        let manifest = "\
[package]\nname = \"demo\"\n\
[package.metadata.frankenapproval]\napproved-dir = \"tests/approved/\"\nclean-unused = true\n";
        let result = load_from_str(
            Some(manifest),
            Some(Path::new("/work/project/Cargo.toml")),
            Path::new("/elsewhere"),
            &HashMap::new(),
            &RunOverrides::default(),
        )
        .expect("load");
        assert_eq!(result.config.approved_dir, "tests/approved");
        assert!(result.config.clean_unused);
        assert!(!result.config.auto_approve);
        assert_eq!(result.project_root, root());
        assert_eq!(
            result.approvals_dir(),
            Path::new("/work/project/tests/approved")
        );
    }

    #[test]
    fn workspace_metadata_table_is_applied() {
        let manifest = "\
[workspace]\nmembers = []\n\
[workspace.metadata.frankenapproval]\nauto-approve = true\n";
        let result = load_from_str(
            Some(manifest),
            Some(Path::new("/work/project/Cargo.toml")),
            root(),
            &HashMap::new(),
            &RunOverrides::default(),
        )
        .expect("load");
        assert!(result.config.auto_approve);
    }

    #[test]
    fn reporters_table_is_parsed() {
        let manifest = r#"
[package.metadata.frankenapproval]
reporters = [
    { name = "kdiff3", commands = [["kdiff3", "%received", "%approved"]], binary = false },
]
"#;
        let result = load_from_str(
            Some(manifest),
            Some(Path::new("/work/project/Cargo.toml")),
            root(),
            &HashMap::new(),
            &RunOverrides::default(),
        )
        .expect("load");
        assert_eq!(result.config.reporters.len(), 1);
        assert_eq!(result.config.reporters[0].name, "kdiff3");
        assert_eq!(result.config.reporters[0].differences_exit_code, None);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn precedence_is_overrides_then_env_then_file() {
        let manifest = "\
[package.metadata.frankenapproval]\napproved-dir = \"from-file\"\nauto-approve = false\n";
        let env = HashMap::from([
            ("FRANKENAPPROVAL_APPROVED_DIR".into(), "from-env".into()),
            ("FRANKENAPPROVAL_AUTO_APPROVE".into(), "yes".into()),
        ]);
        let overrides = RunOverrides {
            approved_dir: Some("from-flag".into()),
            ..RunOverrides::default()
        };

        let result = load_from_str(
            Some(manifest),
            Some(Path::new("/work/project/Cargo.toml")),
            root(),
            &env,
            &overrides,
        )
        .expect("load");
        assert_eq!(result.config.approved_dir, "from-flag");
        assert!(result.config.auto_approve);
        assert!(
            result
                .env_keys_used
                .contains(&"FRANKENAPPROVAL_AUTO_APPROVE".to_string())
        );
        assert_eq!(result.override_flags_used, vec!["--approved-dir".to_string()]);
    }

    #[test]
    fn unknown_keys_are_reported_as_warnings() {
        let manifest = "[package.metadata.frankenapproval]\nreporter-timeout = 5\n";
        let result = load_from_str(
            Some(manifest),
            Some(Path::new("/work/project/Cargo.toml")),
            root(),
            &HashMap::new(),
            &RunOverrides::default(),
        )
        .expect("load");
        assert!(result.warnings.iter().any(|warning| warning.reason_code
            == "config.unknown_key.warning"
            && warning.field == "frankenapproval.reporter-timeout"));
    }

    #[test]
    fn absolute_approved_dir_is_rejected() {
        let overrides = RunOverrides {
            approved_dir: Some("/var/approved".into()),
            ..RunOverrides::default()
        };
        let err = load_from_str(None, None, root(), &HashMap::new(), &overrides)
            .expect_err("must reject absolute dir");
        assert!(matches!(
            err,
            ApprovalError::InvalidConfig { field, .. } if field == "approved-dir"
        ));
    }

    #[test]
    fn invalid_env_boolean_is_rejected() {
        let env = HashMap::from([("FRANKENAPPROVAL_CLEAN_UNUSED".into(), "sometimes".into())]);
        let err = load_from_str(None, None, root(), &env, &RunOverrides::default())
            .expect_err("must reject invalid bool");
        assert!(err.is_configuration_error());
    }

    #[test]
    fn reporter_without_commands_is_rejected() {
        let manifest = "\
[package.metadata.frankenapproval]\nreporters = [{ name = \"empty\", commands = [] }]\n";
        let err = load_from_str(
            Some(manifest),
            Some(Path::new("/work/project/Cargo.toml")),
            root(),
            &HashMap::new(),
            &RunOverrides::default(),
        )
        .expect_err("must reject empty commands");
        assert!(matches!(err, ApprovalError::InvalidConfig { .. }));
    }

    #[test]
    fn discovery_walks_up_to_the_manifest_with_the_table() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let workspace = tmp.path();
        let member = workspace.join("crates").join("member");
        let nested = member.join("tests").join("deep");
        fs::create_dir_all(&nested).expect("create dirs");
        fs::write(
            workspace.join("Cargo.toml"),
            "[workspace]\n[workspace.metadata.frankenapproval]\napproved-dir = \"approved\"\n",
        )
        .expect("write workspace manifest");
        fs::write(member.join("Cargo.toml"), "[package]\nname = \"member\"\n")
            .expect("write member manifest");

        let discovery = discover(&nested).expect("discover");
        assert_eq!(discovery.nearest_manifest_dir.as_deref(), Some(member.as_path()));
        let (path, _) = discovery.manifest.expect("manifest with table");
        assert_eq!(path, workspace.join("Cargo.toml"));

        let result =
            load_from_sources(&nested, &HashMap::new(), &RunOverrides::default()).expect("load");
        assert_eq!(result.project_root, workspace);
        assert_eq!(result.approvals_dir(), workspace.join("approved"));
    }

    #[test]
    fn discovery_without_table_falls_back_to_nearest_manifest() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let member = tmp.path().join("member");
        fs::create_dir_all(member.join("src")).expect("create dirs");
        fs::write(member.join("Cargo.toml"), "[package]\nname = \"member\"\n")
            .expect("write manifest");

        let result = load_from_sources(
            &member.join("src"),
            &HashMap::new(),
            &RunOverrides::default(),
        )
        .expect("load");
        assert_eq!(result.project_root, member);
        assert!(result.config_file_used.is_none());
    }
}
