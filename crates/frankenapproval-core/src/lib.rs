//! Core types for the frankenapproval approval-testing engine.
//!
//! This crate owns everything that does not spawn processes: the error
//! taxonomy (`ApprovalError`), configuration discovery, test identity, artifact
//! naming, the run registry (call counters and used-files ledger), content
//! kinds, the writer, the comparator contract, and scrubbers.

pub mod compare;
pub mod config;
pub mod content;
pub mod error;
pub mod identity;
pub mod naming;
pub mod registry;
pub mod scrub;
pub mod tracing_config;
pub mod write;

pub use compare::{Comparator, ExactComparator};
pub use config::{
    ApprovalConfig, ConfigDiscovery, ConfigLoadResult, ConfigSource, ConfigWarning, ReporterEntry,
    RunOverrides,
};
pub use content::{ContentFormat, ContentKind, ContentRegistry, Payload};
pub use error::{ApprovalError, ApprovalResult};
pub use identity::{
    CallIdentity, ChainedIdentity, EnvIdentity, FixedIdentity, IdentitySource, ThreadNameIdentity,
};
pub use naming::{ArtifactPair, NameResolver};
pub use registry::RunRegistry;
pub use scrub::{Scrubber, datetime_scrubber, regex_scrubber, uuid_scrubber};
