//! PDF converter, grounded on the teacher's `extract_pdf` (`extract.rs`).

use super::{ConvertError, ConvertErrorKind, Converter, RawConversion};

pub const MIME_PDF: &str = "application/pdf";

pub struct PdfConverter;

impl Converter for PdfConverter {
    fn id(&self) -> &'static str {
        "adapter.pdf"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn can_handle(&self, mime: &str, ext: Option<&str>) -> bool {
        mime == MIME_PDF || ext == Some("pdf")
    }

    fn convert(&self, bytes: &[u8]) -> Result<RawConversion, ConvertError> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ConvertError::new(ConvertErrorKind::Corrupt, format!("PDF extraction failed: {e}")))?;
        Ok(RawConversion {
            markdown: text,
            title: None,
            language_hint: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_is_corrupt() {
        let c = PdfConverter;
        let err = c.convert(b"not a pdf").unwrap_err();
        assert_eq!(err.kind, ConvertErrorKind::Corrupt);
    }

    #[test]
    fn handles_by_mime_or_extension() {
        let c = PdfConverter;
        assert!(c.can_handle(MIME_PDF, None));
        assert!(c.can_handle("application/octet-stream", Some("pdf")));
        assert!(!c.can_handle("text/plain", Some("txt")));
    }
}
