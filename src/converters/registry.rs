//! Converter dispatch registry and the bounded pipeline stage around it
//! (spec §4.2): size check, timeout, canonicalization, mirror hash.

use std::sync::Arc;
use std::time::Duration;

use crate::store::sha256_hex;

use super::docx::DocxConverter;
use super::markdown::MarkdownConverter;
use super::pdf::PdfConverter;
use super::plaintext::PlaintextConverter;
use super::pptx::PptxConverter;
use super::xlsx::XlsxConverter;
use super::{canonicalize, ConversionArtifact, ConvertError, ConvertErrorKind, Converter};

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_bytes: usize,
    pub max_output_chars: usize,
    pub timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            max_output_chars: 2_000_000,
            timeout: super::DEFAULT_TIMEOUT,
        }
    }
}

/// Priority-ordered converter list. Native markdown/plaintext are registered
/// first so they always win over adapters for their MIME types, matching
/// the registry-dispatch rule in spec §4.2.
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn Converter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self {
            converters: vec![
                Arc::new(MarkdownConverter),
                Arc::new(PlaintextConverter),
                Arc::new(PdfConverter),
                Arc::new(DocxConverter),
                Arc::new(PptxConverter),
                Arc::new(XlsxConverter),
            ],
        }
    }

    fn dispatch(&self, mime: &str, ext: Option<&str>) -> Option<Arc<dyn Converter>> {
        self.converters
            .iter()
            .find(|c| c.can_handle(mime, ext))
            .cloned()
    }

    /// Run the full pipeline stage: size check, converter dispatch under a
    /// timeout, canonicalization, mirror hash.
    pub async fn convert(
        &self,
        bytes: Vec<u8>,
        mime: &str,
        ext: Option<&str>,
        limits: Limits,
    ) -> Result<ConversionArtifact, ConvertError> {
        if bytes.len() > limits.max_bytes {
            return Err(ConvertError::too_large(format!(
                "input is {} bytes, limit is {}",
                bytes.len(),
                limits.max_bytes
            )));
        }

        let converter = self
            .dispatch(mime, ext)
            .ok_or_else(|| ConvertError::unsupported(format!("no converter for mime '{mime}'")))?;

        let timeout = limits.timeout;
        let raw = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || converter.convert(&bytes)),
        )
        .await
        .map_err(|_| ConvertError::timeout(format!("converter exceeded {timeout:?}")))?
        .map_err(|e| ConvertError::new(ConvertErrorKind::Internal, format!("converter task panicked: {e}")))??;

        let (markdown, truncated) = canonicalize(&raw.markdown, limits.max_output_chars);
        let mirror_hash = sha256_hex(markdown.as_bytes());

        Ok(ConversionArtifact {
            markdown,
            mirror_hash,
            title: raw.title,
            language_hint: raw.language_hint,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatches_markdown_natively() {
        let registry = ConverterRegistry::new();
        let artifact = registry
            .convert(b"# Title\nbody\n".to_vec(), "text/markdown", Some("md"), Limits::default())
            .await
            .unwrap();
        assert_eq!(artifact.title.as_deref(), Some("Title"));
        assert!(!artifact.mirror_hash.is_empty());
    }

    #[tokio::test]
    async fn unknown_mime_is_unsupported() {
        let registry = ConverterRegistry::new();
        let err = registry
            .convert(b"\x00\x01".to_vec(), "application/x-unknown", None, Limits::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ConvertErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn oversized_input_is_too_large() {
        let registry = ConverterRegistry::new();
        let limits = Limits { max_bytes: 4, ..Limits::default() };
        let err = registry
            .convert(b"hello world".to_vec(), "text/plain", Some("txt"), limits)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ConvertErrorKind::TooLarge);
    }
}
