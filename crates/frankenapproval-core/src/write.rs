//! Artifact writer: the only code that creates received files or approved placeholders.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::content::{ContentFormat, ContentKind, Payload};
use crate::error::{ApprovalError, ApprovalResult};
use crate::naming::ArtifactPair;
use crate::scrub::{Scrubber, apply_scrubbers};

/// Scrub `text`, then append a newline if it does not already end with one.
#[must_use]
pub fn normalize_text(text: &str, scrubbers: &[Scrubber]) -> String {
    let mut scrubbed = apply_scrubbers(text, scrubbers);
    if !scrubbed.ends_with('\n') {
        scrubbed.push('\n');
    }
    scrubbed
}

/// Write the received file and create the approved placeholder if absent.
///
/// Existing approved files are never touched.
///
/// # Errors
///
/// - `InvalidExtension` if the payload kind disagrees with `format`.
/// - `Io` on filesystem failures.
pub fn write_artifacts(
    pair: &ArtifactPair,
    payload: Payload<'_>,
    format: &ContentFormat,
    scrubbers: &[Scrubber],
) -> ApprovalResult<()> {
    if payload.kind() != format.kind {
        return Err(ApprovalError::InvalidExtension {
            extension: extension_of(&pair.received),
            reason: format!(
                "{} payload cannot be written to a {} format",
                payload.kind(),
                format.kind
            ),
        });
    }

    ensure_parent(&pair.received)?;
    ensure_parent(&pair.approved)?;

    match payload {
        Payload::Text(text) => fs::write(&pair.received, normalize_text(text, scrubbers))?,
        Payload::Binary(bytes) => fs::write(&pair.received, bytes)?,
    }

    if create_placeholder(&pair.approved, &format.placeholder)? {
        debug!(
            approved = %pair.approved.display(),
            placeholder_len = format.placeholder.len(),
            "created approved placeholder"
        );
    }
    Ok(())
}

/// Copy the received file over the approved file.
///
/// # Errors
///
/// Returns `ApprovalError::Io` if the copy fails.
pub fn approve(pair: &ArtifactPair) -> ApprovalResult<()> {
    fs::copy(&pair.received, &pair.approved)?;
    Ok(())
}

/// Delete the received file; a missing file is not an error.
///
/// # Errors
///
/// Returns `ApprovalError::Io` for failures other than not-found.
pub fn discard_received(pair: &ArtifactPair) -> ApprovalResult<()> {
    remove_if_present(&pair.received)?;
    Ok(())
}

/// Remove the approved file if it still holds exactly the format placeholder.
///
/// Returns whether a file was removed.
///
/// # Errors
///
/// Returns `ApprovalError::Io` for read or delete failures other than not-found.
pub fn discard_placeholder(pair: &ArtifactPair, format: &ContentFormat) -> ApprovalResult<bool> {
    let bytes = match fs::read(&pair.approved) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    if bytes != *format.placeholder {
        return Ok(false);
    }
    let removed = remove_if_present(&pair.approved)?;
    if removed {
        debug!(
            approved = %pair.approved.display(),
            kind = %format.kind,
            "removed unfilled approved placeholder"
        );
    }
    Ok(removed)
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn create_placeholder(path: &Path, bytes: &[u8]) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(bytes)?;
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err),
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
