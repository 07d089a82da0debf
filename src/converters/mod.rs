//! Format converters: pluggable adapters from raw bytes to canonical markdown.
//!
//! Grounded on the teacher's connector/extract split (`extract.rs`,
//! `traits.rs`): extraction stays format-specific and dumb, while this module
//! owns dispatch, size/time bounding, and canonicalization — the pipeline
//! layer never reaches into a converter's internals.

mod canonicalize;
mod docx;
mod markdown;
mod ooxml;
mod pdf;
mod plaintext;
mod pptx;
mod registry;
mod xlsx;

pub use canonicalize::canonicalize;
pub use registry::{ConverterRegistry, Limits};

use std::time::Duration;

/// Result of a successful conversion, before canonicalization.
#[derive(Debug, Clone)]
pub struct RawConversion {
    pub markdown: String,
    pub title: Option<String>,
    pub language_hint: Option<String>,
}

/// Final artifact returned by the converter pipeline stage (spec §4.2 step 6).
#[derive(Debug, Clone)]
pub struct ConversionArtifact {
    pub markdown: String,
    pub mirror_hash: String,
    pub title: Option<String>,
    pub language_hint: Option<String>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertErrorKind {
    Unsupported,
    TooLarge,
    Timeout,
    Corrupt,
    Permission,
    Io,
    AdapterFailure,
    Internal,
}

impl ConvertErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvertErrorKind::Unsupported => "UNSUPPORTED",
            ConvertErrorKind::TooLarge => "TOO_LARGE",
            ConvertErrorKind::Timeout => "TIMEOUT",
            ConvertErrorKind::Corrupt => "CORRUPT",
            ConvertErrorKind::Permission => "PERMISSION",
            ConvertErrorKind::Io => "IO",
            ConvertErrorKind::AdapterFailure => "ADAPTER_FAILURE",
            ConvertErrorKind::Internal => "INTERNAL",
        }
    }

    /// Whether ingestion should requeue this file for another attempt.
    fn default_retryable(self) -> bool {
        matches!(
            self,
            ConvertErrorKind::Timeout | ConvertErrorKind::Io | ConvertErrorKind::AdapterFailure
        )
    }
}

#[derive(Debug, Clone)]
pub struct ConvertError {
    pub kind: ConvertErrorKind,
    pub message: String,
    pub retryable: bool,
    pub fatal: bool,
}

impl ConvertError {
    pub fn new(kind: ConvertErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.default_retryable();
        Self {
            kind,
            message: message.into(),
            retryable,
            fatal: !retryable,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ConvertErrorKind::Unsupported, message)
    }

    pub fn too_large(message: impl Into<String>) -> Self {
        Self::new(ConvertErrorKind::TooLarge, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ConvertErrorKind::Timeout, message)
    }
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ConvertError {}

/// A pluggable format adapter. `convert` is synchronous and CPU-bound; the
/// registry wraps it with a timeout via `tokio::task::spawn_blocking` +
/// `tokio::time::timeout`.
pub trait Converter: Send + Sync {
    fn id(&self) -> &'static str;
    fn version(&self) -> &'static str;
    fn can_handle(&self, mime: &str, ext: Option<&str>) -> bool;
    fn convert(&self, bytes: &[u8]) -> Result<RawConversion, ConvertError>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
