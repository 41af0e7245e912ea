//! Comparator contract and the default byte/text comparator.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{ApprovalError, ApprovalResult};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Decides whether a received artifact matches its approved counterpart.
///
/// Both files are guaranteed to exist when this is called.
pub trait Comparator: Send + Sync + fmt::Debug {
    /// `Ok(false)` on mismatch; errors are reserved for I/O failures.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::Comparison` when either file cannot be read.
    fn equal(&self, received: &Path, approved: &Path) -> ApprovalResult<bool>;
}

/// Exact byte comparison, optionally falling back to decoded text equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactComparator {
    text_fallback: bool,
}

impl ExactComparator {
    /// Bytes only. Used for binary content.
    #[must_use]
    pub const fn bytes() -> Self {
        Self {
            text_fallback: false,
        }
    }

    /// Bytes first, then decoded text with line endings normalized.
    #[must_use]
    pub const fn text() -> Self {
        Self {
            text_fallback: true,
        }
    }
}

impl Default for ExactComparator {
    fn default() -> Self {
        Self::text()
    }
}

impl Comparator for ExactComparator {
    fn equal(&self, received: &Path, approved: &Path) -> ApprovalResult<bool> {
        let read = |path: &Path| {
            fs::read(path).map_err(|source| ApprovalError::Comparison {
                received: received.to_path_buf(),
                approved: approved.to_path_buf(),
                source,
            })
        };
        let received_bytes = read(received)?;
        let approved_bytes = read(approved)?;

        if received_bytes == approved_bytes {
            return Ok(true);
        }
        if !self.text_fallback {
            return Ok(false);
        }

        Ok(
            match (decode_text(&received_bytes), decode_text(&approved_bytes)) {
                (Some(a), Some(b)) => normalize_newlines(&a) == normalize_newlines(&b),
                _ => false,
            },
        )
    }
}

/// Decode UTF-8 (optional BOM) or BOM-marked UTF-16.
fn decode_text(bytes: &[u8]) -> Option<String> {
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}
