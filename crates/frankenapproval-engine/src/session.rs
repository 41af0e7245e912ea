//! `ApprovalSession`: the run-scoped context every verification goes through.
//!
//! A session owns the configuration, the name resolver, the run registry
//! (call counters and used-files ledger), the content registry, and the
//! reporter invoker. Separate sessions share nothing, so tests can build
//! isolated sessions side by side in one process.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use frankenapproval_core::config::{
    self, ApprovalConfig, ConfigLoadResult, RunOverrides, emit_config_loaded,
};
use frankenapproval_core::content::{ContentRegistry, Payload};
use frankenapproval_core::error::{ApprovalError, ApprovalResult};
use frankenapproval_core::identity::{CallIdentity, ChainedIdentity, IdentitySource};
use frankenapproval_core::naming::{ArtifactPair, NameResolver};
use frankenapproval_core::registry::RunRegistry;
use frankenapproval_report::descriptor::{ReporterDescriptor, reporter_table};
use frankenapproval_report::invoker::{
    CommandRunner, ReporterInvoker, SystemCommandRunner, is_ci,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::json::{JSON_EXTENSION, render_json, render_json_str};
use crate::sweep::{RunScope, SweepReport, sweep};
use crate::verify::{Verdict, VerifyOptions, run_verification};

/// Default extension for text verification.
pub const TEXT_EXTENSION: &str = ".txt";

const HOME_ENV: &str = "HOME";

pub struct ApprovalSession {
    config: ApprovalConfig,
    resolver: NameResolver,
    identity: Box<dyn IdentitySource>,
    registry: Mutex<RunRegistry>,
    contents: ContentRegistry,
    invoker: ReporterInvoker,
}

impl fmt::Debug for ApprovalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalSession")
            .field("config", &self.config)
            .field("root", &self.resolver.root())
            .field("identity", &self.identity.describe())
            .field("contents", &self.contents.binary_extensions())
            .field("ci_mode", &self.invoker.ci_mode())
            .finish_non_exhaustive()
    }
}

impl ApprovalSession {
    #[must_use]
    pub fn builder() -> ApprovalSessionBuilder {
        ApprovalSessionBuilder::default()
    }

    /// Session for the current process: cwd, process environment, no overrides.
    ///
    /// # Errors
    ///
    /// Propagates configuration discovery, parsing, and validation failures.
    pub fn from_environment() -> ApprovalResult<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let cwd = std::env::current_dir()?;
        Self::from_sources(&cwd, &env, &RunOverrides::default())
    }

    /// Session configured from `start_dir` upward, an environment snapshot,
    /// and explicit overrides.
    ///
    /// # Errors
    ///
    /// Propagates configuration discovery, parsing, and validation failures.
    pub fn from_sources(
        start_dir: &Path,
        env: &HashMap<String, String>,
        overrides: &RunOverrides,
    ) -> ApprovalResult<Self> {
        let loaded = config::load_from_sources(start_dir, env, overrides)?;
        emit_config_loaded(&loaded);
        for warning in &loaded.warnings {
            warn!(
                reason_code = %warning.reason_code,
                field = %warning.field,
                "{}",
                warning.message
            );
        }

        let mut builder = Self::builder().loaded(loaded).ci_mode(is_ci(env));
        if let Some(home) = env.get(HOME_ENV) {
            builder = builder.home(home);
        }
        builder.build()
    }

    #[must_use]
    pub const fn config(&self) -> &ApprovalConfig {
        &self.config
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        self.resolver.root()
    }

    /// Absolute approvals directory; the project root when `approved-dir` is empty.
    #[must_use]
    pub fn approvals_dir(&self) -> PathBuf {
        self.resolver.approvals_dir()
    }

    #[must_use]
    pub const fn contents(&self) -> &ContentRegistry {
        &self.contents
    }

    #[must_use]
    pub const fn invoker(&self) -> &ReporterInvoker {
        &self.invoker
    }

    /// Options derived from configuration: auto-approve as configured.
    #[must_use]
    pub fn default_options(&self) -> VerifyOptions {
        VerifyOptions::new().auto_approve(self.config.auto_approve)
    }

    /// Identity of the running test.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::MissingTestIdentity` outside a running test.
    pub fn current_identity(&self) -> ApprovalResult<CallIdentity> {
        self.identity
            .current()
            .map(|raw| CallIdentity::parse(&raw))
            .filter(|identity| !identity.node().trim().is_empty())
            .ok_or_else(|| ApprovalError::MissingTestIdentity {
                hint: format!("consulted {}", self.identity.describe()),
            })
    }

    /// Next artifact pair for the running test.
    ///
    /// # Errors
    ///
    /// - `MissingTestIdentity` outside a running test.
    /// - `InvalidExtension` for malformed extensions.
    /// - `StatePoisoned` if another thread panicked while holding the registry.
    pub fn resolve(&self, extension: &str) -> ApprovalResult<ArtifactPair> {
        let identity = self.current_identity()?;
        self.resolve_for(&identity, extension)
    }

    /// Next artifact pair for an explicit identity.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), minus the identity lookup.
    pub fn resolve_for(&self, identity: &CallIdentity, extension: &str) -> ApprovalResult<ArtifactPair> {
        let mut registry = self.lock_registry()?;
        self.resolver.resolve(identity, extension, &mut registry)
    }

    /// Verify text with the configured defaults.
    ///
    /// # Errors
    ///
    /// See [`verify_with`](Self::verify_with).
    pub fn verify(&self, text: &str, extension: &str) -> ApprovalResult<Verdict> {
        self.verify_with(text, extension, &self.default_options())
    }

    /// Verify text.
    ///
    /// # Errors
    ///
    /// Configuration errors, `NoApproverAvailable`, and I/O failures. A content
    /// mismatch is `Ok(Verdict::Rejected(..))`, never an error.
    pub fn verify_with(
        &self,
        text: &str,
        extension: &str,
        options: &VerifyOptions,
    ) -> ApprovalResult<Verdict> {
        self.verify_payload(Payload::Text(text), extension, options)
    }

    /// Verify raw bytes against a binary-registered extension.
    ///
    /// # Errors
    ///
    /// `UnsupportedExtension` for extensions without a registered placeholder,
    /// otherwise as [`verify_with`](Self::verify_with).
    pub fn verify_binary(&self, bytes: &[u8], extension: &str) -> ApprovalResult<Verdict> {
        self.verify_binary_with(bytes, extension, &self.default_options())
    }

    /// # Errors
    ///
    /// See [`verify_binary`](Self::verify_binary).
    pub fn verify_binary_with(
        &self,
        bytes: &[u8],
        extension: &str,
        options: &VerifyOptions,
    ) -> ApprovalResult<Verdict> {
        self.verify_payload(Payload::Binary(bytes), extension, options)
    }

    /// Verify any `Serialize` value as pretty JSON (`.json`).
    ///
    /// # Errors
    ///
    /// `InvalidPayload` if the value has no JSON form, otherwise as
    /// [`verify_with`](Self::verify_with).
    pub fn verify_json<T: Serialize + ?Sized>(&self, value: &T, sort: bool) -> ApprovalResult<Verdict> {
        self.verify_json_with(value, sort, &self.default_options())
    }

    /// # Errors
    ///
    /// See [`verify_json`](Self::verify_json).
    pub fn verify_json_with<T: Serialize + ?Sized>(
        &self,
        value: &T,
        sort: bool,
        options: &VerifyOptions,
    ) -> ApprovalResult<Verdict> {
        let rendered = render_json(value, sort)?;
        self.verify_with(&rendered, JSON_EXTENSION, options)
    }

    /// Verify JSON text after normalizing its layout.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` if `text` is not JSON, otherwise as
    /// [`verify_with`](Self::verify_with).
    pub fn verify_json_str(&self, text: &str, sort: bool) -> ApprovalResult<Verdict> {
        let rendered = render_json_str(text, sort)?;
        self.verify_with(&rendered, JSON_EXTENSION, &self.default_options())
    }

    #[instrument(
        name = "frankenapproval::verify",
        skip_all,
        fields(extension = %extension, kind = %payload.kind())
    )]
    fn verify_payload(
        &self,
        payload: Payload<'_>,
        extension: &str,
        options: &VerifyOptions,
    ) -> ApprovalResult<Verdict> {
        let format = self.contents.format_for(payload.kind(), extension)?;
        let pair = self.resolve(extension)?;
        run_verification(&pair, payload, &format, &self.invoker, options)
    }

    /// Snapshot of every approved path produced so far.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::StatePoisoned` if the registry lock is poisoned.
    pub fn used_files(&self) -> ApprovalResult<BTreeSet<PathBuf>> {
        Ok(self.lock_registry()?.used_files().clone())
    }

    /// End the run: sweep unused approvals when enabled and the whole suite ran.
    ///
    /// # Errors
    ///
    /// `StatePoisoned` or I/O failures while sweeping.
    pub fn finish(&self, scope: RunScope) -> ApprovalResult<SweepReport> {
        if !self.config.clean_unused || scope == RunScope::Partial {
            info!(
                clean_unused = self.config.clean_unused,
                scope = ?scope,
                "skipping unused approval cleanup"
            );
            return Ok(SweepReport::skipped());
        }
        let used = self.used_files()?;
        sweep(&self.approvals_dir(), &used)
    }

    fn lock_registry(&self) -> ApprovalResult<MutexGuard<'_, RunRegistry>> {
        self.registry
            .lock()
            .map_err(|_| ApprovalError::StatePoisoned)
    }
}

/// Explicit construction of an [`ApprovalSession`].
#[derive(Default)]
pub struct ApprovalSessionBuilder {
    root: Option<PathBuf>,
    config: ApprovalConfig,
    identity: Option<Box<dyn IdentitySource>>,
    runner: Option<Arc<dyn CommandRunner>>,
    reporters: Option<Vec<ReporterDescriptor>>,
    contents: Option<ContentRegistry>,
    ci_mode: bool,
    home: Option<PathBuf>,
}

impl fmt::Debug for ApprovalSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalSessionBuilder")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("ci_mode", &self.ci_mode)
            .finish_non_exhaustive()
    }
}

impl ApprovalSessionBuilder {
    /// Project root every artifact path is anchored at. Defaults to cwd.
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: ApprovalConfig) -> Self {
        self.config = config;
        self
    }

    /// Take config and project root from a loader result.
    #[must_use]
    pub fn loaded(self, loaded: ConfigLoadResult) -> Self {
        self.root(loaded.project_root).config(loaded.config)
    }

    #[must_use]
    pub fn identity(mut self, identity: impl IdentitySource + 'static) -> Self {
        self.identity = Some(Box::new(identity));
        self
    }

    #[must_use]
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Replace the whole reporter table (configured reporters are then ignored).
    #[must_use]
    pub fn reporters(mut self, reporters: Vec<ReporterDescriptor>) -> Self {
        self.reporters = Some(reporters);
        self
    }

    #[must_use]
    pub fn contents(mut self, contents: ContentRegistry) -> Self {
        self.contents = Some(contents);
        self
    }

    #[must_use]
    pub const fn ci_mode(mut self, ci_mode: bool) -> Self {
        self.ci_mode = ci_mode;
        self
    }

    #[must_use]
    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// # Errors
    ///
    /// `Io` if the working directory is unreadable or the approvals directory
    /// cannot be created.
    pub fn build(self) -> ApprovalResult<ApprovalSession> {
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let resolver = NameResolver::new(&root, &self.config.approved_dir)?;
        if !self.config.approved_dir.is_empty() {
            fs::create_dir_all(resolver.approvals_dir())?;
        }

        let reporters = self
            .reporters
            .unwrap_or_else(|| reporter_table(&self.config.reporters, self.home.as_deref()));
        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(SystemCommandRunner));

        Ok(ApprovalSession {
            resolver,
            identity: self
                .identity
                .unwrap_or_else(|| Box::new(ChainedIdentity::default())),
            registry: Mutex::new(RunRegistry::new()),
            contents: self.contents.unwrap_or_default(),
            invoker: ReporterInvoker::new(reporters, runner, self.ci_mode),
            config: self.config,
        })
    }
}
