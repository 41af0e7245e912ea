//! Cross-crate lifecycle tests for frankenapproval.
//!
//! These drive whole sessions through the facade: naming, writing,
//! reporting, re-comparison, and the end-of-run sweep. Per-module behavior is
//! covered by the inline `#[cfg(test)]` modules.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use frankenapproval::{
    ApprovalConfig, ApprovalError, ApprovalSession, FixedIdentity, ReporterDescriptor, RunOverrides,
    RunScope, ScriptedCommandRunner, ScriptedResponse, TEXT_EXTENSION, Verdict, VerifyOptions,
    uuid_scrubber,
};
use tracing_test::traced_test;

// ═══════════════════════════════════════════════════════════════════════════
// Test helpers
// ═══════════════════════════════════════════════════════════════════════════

fn scripted_session(
    root: &Path,
    identity: &str,
    runner: ScriptedCommandRunner,
) -> (ApprovalSession, Arc<ScriptedCommandRunner>) {
    let runner = Arc::new(runner);
    let session = ApprovalSession::builder()
        .root(root)
        .identity(FixedIdentity(identity.into()))
        .runner(runner.clone())
        .build()
        .expect("build session");
    (session, runner)
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|error| panic!("read {}: {error}", path.display()))
}

// ═══════════════════════════════════════════════════════════════════════════
// Reject, approve by hand, pass
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn reject_then_manual_approve_then_pass() {
    let dir = tempfile::tempdir().expect("tempdir");
    let approved = dir.path().join("tests/render.rs--greeting.approved.txt");
    let received = dir.path().join("tests/render.rs--greeting.received.txt");
    fs::create_dir_all(approved.parent().expect("parent")).expect("mkdir");
    fs::write(&approved, "Hello Moon!\n").expect("seed approved");

    let (session, _) = scripted_session(
        dir.path(),
        "tests/render.rs::greeting",
        ScriptedCommandRunner::new()
            .respond("diff", ScriptedResponse::exit_with_output(1, "-Hello Moon!\n+Hello World!\n")),
    );
    let verdict = session.verify("Hello World!", TEXT_EXTENSION).expect("verify");
    let Verdict::Rejected(rejection) = verdict else {
        panic!("expected rejection");
    };
    assert_eq!(read(&received), "Hello World!\n");
    assert_eq!(read(&approved), "Hello Moon!\n");
    assert!(rejection.to_string().contains(&format!(
        "To approve run mv --force {} {}",
        received.display(),
        approved.display()
    )));

    fs::rename(&received, &approved).expect("manual approval");

    let (rerun, runner) =
        scripted_session(dir.path(), "tests/render.rs::greeting", ScriptedCommandRunner::new());
    assert!(rerun.verify("Hello World!", TEXT_EXTENSION).expect("verify").is_approved());
    assert!(!received.exists());
    assert!(runner.calls().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Parameterized identities
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn long_parameters_map_to_distinct_stable_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let long_a = format!("suite::case[{}]", "a".repeat(300));
    let long_b = format!("suite::case[{}b]", "a".repeat(299));

    let runner = || ScriptedCommandRunner::new().respond("meld", ScriptedResponse::AcceptReceived);
    let (first, _) = scripted_session(dir.path(), &long_a, runner());
    let (again, _) = scripted_session(dir.path(), &long_a, runner());
    let (other, _) = scripted_session(dir.path(), &long_b, runner());

    let pair_first = first.resolve(TEXT_EXTENSION).expect("resolve");
    let pair_again = again.resolve(TEXT_EXTENSION).expect("resolve");
    let pair_other = other.resolve(TEXT_EXTENSION).expect("resolve");

    assert_eq!(pair_first, pair_again);
    assert_ne!(pair_first.approved, pair_other.approved);
    let name = pair_first
        .approved
        .file_name()
        .expect("file name")
        .to_string_lossy()
        .into_owned();
    assert!(name.len() < 64, "{name}");
}

// ═══════════════════════════════════════════════════════════════════════════
// Scrubbed text
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn scrubbed_uuids_make_reruns_stable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = || ScriptedCommandRunner::new().respond("meld", ScriptedResponse::AcceptReceived);
    let options = VerifyOptions::new().scrub(uuid_scrubber().expect("uuid scrubber"));

    let (first, _) = scripted_session(dir.path(), "ids::job", runner());
    let verdict = first
        .verify_with("job 0b7e3c9a-1d2f-4e5a-8b6c-7d8e9f0a1b2c started", TEXT_EXTENSION, &options)
        .expect("first");
    assert!(verdict.is_approved());

    let (second, recorder) = scripted_session(dir.path(), "ids::job", runner());
    let verdict = second
        .verify_with("job 9f8e7d6c-5b4a-4392-8170-fedcba987654 started", TEXT_EXTENSION, &options)
        .expect("second");
    assert!(verdict.is_approved());
    assert!(recorder.calls().is_empty());
    assert_eq!(read(&dir.path().join("ids--job.approved.txt")), "job {{UUID}} started\n");
}

// ═══════════════════════════════════════════════════════════════════════════
// Binary and JSON payloads
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn binary_verification_requires_registered_extension() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, _) = scripted_session(dir.path(), "img::plot", ScriptedCommandRunner::new());

    let err = session.verify_binary(b"GIF89a", ".gif").expect_err("unsupported");
    assert!(matches!(err, ApprovalError::UnsupportedExtension { ref allowed, .. } if allowed.len() == 3));
    assert!(err.is_configuration_error());
}

#[test]
fn binary_acceptance_through_reporter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, runner) = scripted_session(
        dir.path(),
        "img::plot",
        ScriptedCommandRunner::new().respond("code", ScriptedResponse::AcceptReceived),
    );
    let bytes = [0x89, b'P', b'N', b'G', 1, 2, 3];

    assert!(session.verify_binary(&bytes, ".png").expect("verify").is_approved());
    assert_eq!(fs::read(dir.path().join("img--plot.approved.png")).expect("approved"), bytes);
    assert!(!runner.programs().iter().any(|program| program == "meld"));
}

#[test]
fn json_values_are_rendered_sorted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (session, _) = scripted_session(
        dir.path(),
        "data::report",
        ScriptedCommandRunner::new().respond("meld", ScriptedResponse::AcceptReceived),
    );
    let value = serde_json::json!({"b": 100, "a": null});

    assert!(session.verify_json(&value, true).expect("verify").is_approved());
    assert_eq!(
        read(&dir.path().join("data--report.approved.json")),
        "{\n  \"a\": null,\n  \"b\": 100\n}\n"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration through the manifest
// ═══════════════════════════════════════════════════════════════════════════

#[test]
#[traced_test]
fn overrides_beat_environment_and_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("Cargo.toml"),
        "[package]\nname = \"demo\"\n\n[package.metadata.frankenapproval]\napproved-dir = \"from-file\"\n",
    )
    .expect("manifest");
    let env = HashMap::from([(
        "FRANKENAPPROVAL_APPROVED_DIR".to_string(),
        "from-env".to_string(),
    )]);

    let from_env = ApprovalSession::from_sources(dir.path(), &env, &RunOverrides::default())
        .expect("env session");
    assert_eq!(from_env.config().approved_dir, "from-env");

    let overrides = RunOverrides {
        approved_dir: Some("from-flag".into()),
        ..RunOverrides::default()
    };
    let from_flag =
        ApprovalSession::from_sources(dir.path(), &env, &overrides).expect("flag session");
    assert_eq!(from_flag.config().approved_dir, "from-flag");
    assert!(dir.path().join("from-flag").is_dir());
    assert!(logs_contain("frankenapproval configuration loaded"));
    assert!(logs_contain("config_loaded"));
}

#[test]
fn absolute_approved_dir_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let overrides = RunOverrides {
        approved_dir: Some("/etc/approvals".into()),
        ..RunOverrides::default()
    };
    let err = ApprovalSession::from_sources(dir.path(), &HashMap::new(), &overrides)
        .expect_err("absolute dir");
    assert!(matches!(err, ApprovalError::InvalidConfig { .. }));
}

// ═══════════════════════════════════════════════════════════════════════════
// Cleanup sweep
// ═══════════════════════════════════════════════════════════════════════════

#[test]
#[traced_test]
fn full_suite_sweep_removes_only_orphans() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ApprovalConfig {
        approved_dir: "approved".into(),
        clean_unused: true,
        ..ApprovalConfig::default()
    };
    let approvals = dir.path().join("approved");
    fs::create_dir_all(&approvals).expect("mkdir");
    let orphan = approvals.join("old--removed_test.approved.txt");
    let live = approvals.join("suite--kept.approved.txt");
    let outside = dir.path().join("stray.approved.txt");
    fs::write(&orphan, "old\n").expect("seed");
    fs::write(&live, "kept\n").expect("seed");
    fs::write(&outside, "outside\n").expect("seed");

    let session = ApprovalSession::builder()
        .root(dir.path())
        .config(config)
        .identity(FixedIdentity("suite::kept".into()))
        .runner(Arc::new(ScriptedCommandRunner::new()))
        .build()
        .expect("session");
    assert!(session.verify("kept", TEXT_EXTENSION).expect("verify").is_approved());

    assert!(session.finish(RunScope::Partial).expect("partial").skipped);
    assert!(orphan.exists());

    let report = session.finish(RunScope::FullSuite).expect("full");
    assert_eq!(report.deleted, vec![orphan.clone()]);
    assert!(!orphan.exists());
    assert!(live.exists());
    assert!(outside.exists(), "files outside the approvals dir are never swept");
    assert!(logs_contain("deleted unused approved file"));
    assert!(logs_contain("old--removed_test.approved.txt"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Real processes
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(unix)]
#[test]
fn real_reporters_follow_the_exit_code_protocol() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reporters = vec![
        ReporterDescriptor::new(
            "missing",
            vec![vec!["sh".into(), "-c".into(), "exit 127".into()]],
            true,
        ),
        ReporterDescriptor::new(
            "undecided",
            vec![vec!["sh".into(), "-c".into(), "exit 5".into()]],
            true,
        ),
        ReporterDescriptor::new(
            "copy",
            vec![vec!["cp".into(), "%received".into(), "%approved".into()]],
            true,
        ),
    ];
    let session = ApprovalSession::builder()
        .root(dir.path())
        .identity(FixedIdentity("proc::copy".into()))
        .reporters(reporters)
        .build()
        .expect("session");

    assert!(session.verify("copied", TEXT_EXTENSION).expect("verify").is_approved());
    assert_eq!(read(&dir.path().join("proc--copy.approved.txt")), "copied\n");
    assert!(!dir.path().join("proc--copy.received.txt").exists());
}

#[cfg(unix)]
#[test]
fn real_reporters_exhausted_is_a_distinct_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = ApprovalSession::builder()
        .root(dir.path())
        .identity(FixedIdentity("proc::none".into()))
        .reporters(vec![ReporterDescriptor::new(
            "missing",
            vec![vec!["sh".into(), "-c".into(), "exit 127".into()]],
            true,
        )])
        .build()
        .expect("session");

    let err = session
        .verify("anything", TEXT_EXTENSION)
        .expect_err("no approver");
    let ApprovalError::NoApproverAvailable { attempted, .. } = &err else {
        panic!("expected NoApproverAvailable, got {err:?}");
    };
    assert_eq!(attempted, &["sh -c exit 127"]);
    assert!(!dir.path().join("proc--none.approved.txt").exists());
    assert!(dir.path().join("proc--none.received.txt").exists());
}
