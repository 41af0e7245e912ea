//! Content kinds and the extension registry.
//!
//! Every well-formed extension is text unless registered as binary. Binary
//! formats carry a placeholder that is copied into place when no approved
//! file exists yet, so comparators can always assume both files are present.
//! Optional integrations (pixel comparators, chart renderers) plug in through
//! [`ContentRegistry::register_binary_with`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::compare::{Comparator, ExactComparator};
use crate::error::{ApprovalError, ApprovalResult};
use crate::naming::validate_extension;

/// 1x1 transparent PNG.
pub const EMPTY_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x60, 0x00, 0x02, 0x00,
    0x00, 0x05, 0x00, 0x01, 0xe9, 0xfa, 0xdc, 0xd8, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44,
    0xae, 0x42, 0x60, 0x82,
];

/// 1x1 grayscale baseline JPEG.
pub const EMPTY_JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01, 0x00, 0x48,
    0x00, 0x48, 0x00, 0x00, 0xFF, 0xDB, 0x00, 0x43, 0x00, 0x03, 0x02, 0x02, 0x02, 0x02, 0x02, 0x03,
    0x02, 0x02, 0x02, 0x03, 0x03, 0x03, 0x03, 0x04, 0x06, 0x04, 0x04, 0x04, 0x04, 0x04, 0x08, 0x06,
    0x06, 0x05, 0x06, 0x09, 0x08, 0x0A, 0x0A, 0x09, 0x08, 0x09, 0x09, 0x0A, 0x0C, 0x0F, 0x0C, 0x0A,
    0x0B, 0x0E, 0x0B, 0x09, 0x09, 0x0D, 0x11, 0x0D, 0x0E, 0x0F, 0x10, 0x10, 0x11, 0x10, 0x0A, 0x0C,
    0x12, 0x13, 0x12, 0x10, 0x13, 0x0F, 0x10, 0x10, 0x10, 0xFF, 0xC9, 0x00, 0x0B, 0x08, 0x00, 0x01,
    0x00, 0x01, 0x01, 0x01, 0x11, 0x00, 0xFF, 0xCC, 0x00, 0x06, 0x00, 0x10, 0x10, 0x05, 0xFF, 0xDA,
    0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0xD2, 0xCF, 0x20, 0xFF, 0xD9,
];

/// Whether content is written as text or as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Binary,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

/// Payload handed to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

impl Payload<'_> {
    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        match self {
            Self::Text(_) => ContentKind::Text,
            Self::Binary(_) => ContentKind::Binary,
        }
    }
}

/// How one extension is written and compared.
#[derive(Debug, Clone)]
pub struct ContentFormat {
    pub kind: ContentKind,
    /// Bytes of a freshly created approved file.
    pub placeholder: Cow<'static, [u8]>,
    pub comparator: Arc<dyn Comparator>,
}

impl ContentFormat {
    #[must_use]
    pub fn text() -> Self {
        Self {
            kind: ContentKind::Text,
            placeholder: Cow::Borrowed(&[]),
            comparator: Arc::new(ExactComparator::text()),
        }
    }

    #[must_use]
    pub fn binary(placeholder: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            kind: ContentKind::Binary,
            placeholder: placeholder.into(),
            comparator: Arc::new(ExactComparator::bytes()),
        }
    }
}

/// Extension to format lookup.
#[derive(Debug, Clone)]
pub struct ContentRegistry {
    binary: BTreeMap<String, ContentFormat>,
    text: ContentFormat,
}

impl Default for ContentRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ContentRegistry {
    /// Text for everything; no binary extensions.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            binary: BTreeMap::new(),
            text: ContentFormat::text(),
        }
    }

    /// `.png`, `.jpg` and `.jpeg` as binary with embedded placeholders.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for (extension, placeholder) in [
            (".png", EMPTY_PNG),
            (".jpg", EMPTY_JPEG),
            (".jpeg", EMPTY_JPEG),
        ] {
            registry
                .binary
                .insert(extension.to_string(), ContentFormat::binary(placeholder));
        }
        registry
    }

    /// Register `extension` as binary with an exact byte comparator.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::InvalidExtension` for malformed extensions.
    pub fn register_binary(
        &mut self,
        extension: &str,
        placeholder: impl Into<Cow<'static, [u8]>>,
    ) -> ApprovalResult<()> {
        self.register_binary_with(extension, ContentFormat::binary(placeholder))
    }

    /// Register `extension` as binary with a custom format (e.g. a pixel comparator).
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::InvalidExtension` for malformed extensions or a
    /// format whose kind is not binary.
    pub fn register_binary_with(
        &mut self,
        extension: &str,
        format: ContentFormat,
    ) -> ApprovalResult<()> {
        validate_extension(extension)?;
        if format.kind != ContentKind::Binary {
            return Err(ApprovalError::InvalidExtension {
                extension: extension.to_string(),
                reason: "only binary formats can be registered".into(),
            });
        }
        self.binary.insert(extension.to_ascii_lowercase(), format);
        Ok(())
    }

    /// Replace the comparator used for text content.
    pub fn set_text_comparator(&mut self, comparator: Arc<dyn Comparator>) {
        self.text.comparator = comparator;
    }

    /// Registered binary extensions, sorted.
    #[must_use]
    pub fn binary_extensions(&self) -> Vec<String> {
        self.binary.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_binary(&self, extension: &str) -> bool {
        self.binary.contains_key(&extension.to_ascii_lowercase())
    }

    /// Format for `extension` when verifying content of `kind`.
    ///
    /// # Errors
    ///
    /// - `InvalidExtension` for malformed extensions, or text content against a
    ///   binary extension.
    /// - `UnsupportedExtension` for binary content against an unregistered extension.
    pub fn format_for(&self, kind: ContentKind, extension: &str) -> ApprovalResult<ContentFormat> {
        validate_extension(extension)?;
        let registered = self.binary.get(&extension.to_ascii_lowercase());
        match (kind, registered) {
            (ContentKind::Binary, Some(format)) => Ok(format.clone()),
            (ContentKind::Binary, None) => Err(ApprovalError::UnsupportedExtension {
                extension: extension.to_string(),
                allowed: self.binary_extensions(),
            }),
            (ContentKind::Text, Some(_)) => Err(ApprovalError::InvalidExtension {
                extension: extension.to_string(),
                reason: "registered for binary content; use binary verification".into(),
            }),
            (ContentKind::Text, None) => Ok(self.text.clone()),
        }
    }
}
